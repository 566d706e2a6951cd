//! FEPA HTTP client
//!
//! Authenticated access to the FEPA admin REST API with single-flight token
//! refresh, plus notification state merged from polling and push events.

#[macro_use]
extern crate tracing;

pub mod client;
pub mod notifications;
pub mod types;

pub use client::{
    AdminClient, AdminClientBuilder, ApiError, ApiRequest, AuthEvent, ClientError,
    HttpErrorKind, RefreshFailure,
};
pub use notifications::{NotificationCache, NotificationCenter, PushEvent};
