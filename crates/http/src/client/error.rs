//! Client error types

use fepa_core::CoreError;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Normalized shape of every non-2xx response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
    pub url: String,
    pub data: Option<Value>,
}

/// Coarse classification of an [`ApiError`] status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Client,
    Server,
}

impl ApiError {
    /// Build the normalized error from a status and raw response body
    pub fn from_response(status: StatusCode, url: impl Into<String>, body: &str) -> Self {
        let data = serde_json::from_str::<Value>(body).ok();
        let message = data
            .as_ref()
            .and_then(|value| {
                value
                    .get("message")
                    .or_else(|| value.get("error"))
                    .and_then(Value::as_str)
            })
            .map(ToOwned::to_owned)
            .or_else(|| {
                let text = body.trim();
                (!text.is_empty() && data.is_none()).then(|| text.to_string())
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .map_or_else(|| status.to_string(), ToOwned::to_owned)
            });

        Self {
            message,
            status: status.as_u16(),
            url: url.into(),
            data,
        }
    }

    pub const fn kind(&self) -> HttpErrorKind {
        match self.status {
            400 => HttpErrorKind::BadRequest,
            401 => HttpErrorKind::Unauthorized,
            403 => HttpErrorKind::Forbidden,
            404 => HttpErrorKind::NotFound,
            500.. => HttpErrorKind::Server,
            _ => HttpErrorKind::Client,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} {})", self.message, self.status, self.url)
    }
}

/// Why a token refresh cycle failed.
///
/// Cloned to every request that was queued behind the refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("could not persist refreshed tokens: {0}")]
    Storage(String),

    #[error("refresh task ended without a result")]
    Abandoned,
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// No response was received
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server returned an error status
    #[error("API error: {0}")]
    Api(ApiError),

    /// Credentials could not be refreshed; the session is over
    #[error("Session expired: {0}")]
    RefreshFailed(RefreshFailure),

    /// Response did not match the endpoint schema
    #[error("Unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Request body could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Session storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] CoreError),

    /// Push channel failure
    #[error("Socket error: {0}")]
    Socket(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// HTTP status of the failure, when the server answered
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api(error) => Some(error.status),
            Self::RefreshFailed(RefreshFailure::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Whether the caller must log in again
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::RefreshFailed(_))
    }

    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(error) => Some(error),
            _ => None,
        }
    }
}
