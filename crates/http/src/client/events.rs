//! Session lifecycle events

use super::error::RefreshFailure;

/// Broadcast to every subscriber of a client's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn { user_id: String },
    TokensRefreshed,
    /// Credentials were cleared; the user has to log in again
    SessionExpired { reason: RefreshFailure },
    LoggedOut,
}
