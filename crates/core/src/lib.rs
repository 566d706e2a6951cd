//! FEPA core types and utilities
//!
//! Shared vocabulary for the admin client: closed status enums, the
//! notification and session models, and the key/value storage that stands in
//! for browser local and session storage.

pub mod error;
pub mod session;
pub mod storage;
pub mod types;

#[cfg(any(test, feature = "tests"))]
pub mod tests;

pub use error::{CoreError, CoreResult};
pub use session::{SessionStore, keys};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use types::{
    BlogStatus, ModerationAction, Notification, NotificationKind, SubscriptionStatus, TokenPair,
    UserRole, UserSnapshot, UserStatus,
};
