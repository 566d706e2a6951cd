use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Access/refresh credential pair issued by the auth endpoints
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Moderator,
    User,
}

impl UserRole {
    /// Whether this role may use the admin dashboard at all
    #[must_use]
    pub const fn is_staff(self) -> bool {
        match self {
            Self::Admin | Self::Moderator => true,
            Self::User => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
    Banned,
}

/// Snapshot of the authenticated user kept in session storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
    System,
    Budget,
    Subscription,
    Blog,
    Payment,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::System => "system",
            Self::Budget => "budget",
            Self::Subscription => "subscription",
            Self::Blog => "blog",
            Self::Payment => "payment",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification addressed to the current admin user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(alias = "isRead")]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

/// Moderator decision applied to a blog post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => f.write_str("approve"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

impl BlogStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Status after a moderator applies `action`.
    ///
    /// Drafts are never moderated and approved posts stay approved; a
    /// rejected post may be approved on a second review.
    pub fn moderate(self, action: ModerationAction) -> Result<Self, CoreError> {
        match (self, action) {
            (Self::Pending | Self::Rejected, ModerationAction::Approve) => Ok(Self::Approved),
            (Self::Pending, ModerationAction::Reject) => Ok(Self::Rejected),
            (Self::Draft | Self::Approved, _) | (Self::Rejected, ModerationAction::Reject) => {
                Err(CoreError::InvalidTransition {
                    from: self.as_str().to_string(),
                    action: action.to_string(),
                })
            }
        }
    }

    /// Whether the post is publicly visible
    #[must_use]
    pub const fn is_published(self) -> bool {
        match self {
            Self::Approved => true,
            Self::Draft | Self::Pending | Self::Rejected => false,
        }
    }
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    #[serde(alias = "canceled")]
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    /// Whether the subscriber currently has access to paid features
    #[must_use]
    pub const fn grants_access(self) -> bool {
        match self {
            Self::Active | Self::Trialing => true,
            Self::PastDue | Self::Cancelled | Self::Expired => false,
        }
    }
}
