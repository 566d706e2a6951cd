//! Typed access to persisted session data

use crate::error::CoreResult;
use crate::storage::{KeyValueStorage, MemoryStorage};
use crate::types::{TokenPair, UserSnapshot};
use std::sync::Arc;

/// Storage keys used by the admin client
pub mod keys {
    /// Local storage: short-lived bearer credential
    pub const ACCESS_TOKEN: &str = "fepa.access_token";
    /// Local storage: credential exchanged for a new access token
    pub const REFRESH_TOKEN: &str = "fepa.refresh_token";
    /// Local storage: email prefilled on the next login
    pub const REMEMBER_EMAIL: &str = "fepa.remember_email";
    /// Session storage: snapshot of the authenticated user
    pub const USER: &str = "fepa.user";
    /// Session storage: anti-forgery token for mutating requests
    pub const CSRF_TOKEN: &str = "fepa.csrf_token";
}

/// Session data split across a persistent store and a process-lifetime store
#[derive(Clone)]
pub struct SessionStore {
    local: Arc<dyn KeyValueStorage>,
    session: Arc<dyn KeyValueStorage>,
}

impl SessionStore {
    pub fn new(local: Arc<dyn KeyValueStorage>, session: Arc<dyn KeyValueStorage>) -> Self {
        Self { local, session }
    }

    /// Both stores in memory; nothing outlives the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    pub async fn access_token(&self) -> CoreResult<Option<String>> {
        self.local.get(keys::ACCESS_TOKEN).await
    }

    pub async fn refresh_token(&self) -> CoreResult<Option<String>> {
        self.local.get(keys::REFRESH_TOKEN).await
    }

    pub async fn tokens(&self) -> CoreResult<Option<TokenPair>> {
        let access = self.access_token().await?;
        let refresh = self.refresh_token().await?;
        Ok(access
            .zip(refresh)
            .map(|(access, refresh)| TokenPair::new(access, refresh)))
    }

    /// Replace both tokens in a single storage write
    pub async fn store_tokens(&self, tokens: &TokenPair) -> CoreResult<()> {
        self.local
            .set_many(vec![
                (keys::ACCESS_TOKEN.to_string(), tokens.access_token.clone()),
                (keys::REFRESH_TOKEN.to_string(), tokens.refresh_token.clone()),
            ])
            .await
    }

    /// Forget credentials and everything derived from them.
    ///
    /// The remembered email survives, as it does across a browser logout.
    pub async fn clear_credentials(&self) -> CoreResult<()> {
        self.local
            .remove_many(&[keys::ACCESS_TOKEN, keys::REFRESH_TOKEN])
            .await?;
        self.session
            .remove_many(&[keys::USER, keys::CSRF_TOKEN])
            .await
    }

    pub async fn is_authenticated(&self) -> CoreResult<bool> {
        Ok(self.access_token().await?.is_some())
    }

    pub async fn user(&self) -> CoreResult<Option<UserSnapshot>> {
        match self.session.get(keys::USER).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_user(&self, user: &UserSnapshot) -> CoreResult<()> {
        self.session
            .set(keys::USER, serde_json::to_string(user)?)
            .await
    }

    pub async fn csrf_token(&self) -> CoreResult<Option<String>> {
        self.session.get(keys::CSRF_TOKEN).await
    }

    pub async fn set_csrf_token(&self, token: String) -> CoreResult<()> {
        self.session.set(keys::CSRF_TOKEN, token).await
    }

    pub async fn remembered_email(&self) -> CoreResult<Option<String>> {
        self.local.get(keys::REMEMBER_EMAIL).await
    }

    /// Remember `email` for the next login, or forget it with `None`
    pub async fn remember_email(&self, email: Option<&str>) -> CoreResult<()> {
        match email {
            Some(email) => self.local.set(keys::REMEMBER_EMAIL, email.to_string()).await,
            None => self.local.remove(keys::REMEMBER_EMAIL).await,
        }
    }
}
