//! Single-flight access token refresh
//!
//! Every request that sees a 401 calls [`RefreshCoordinator::recover`]. The
//! first caller starts the refresh; callers arriving while it is in flight
//! are queued and all of them receive the same outcome, in arrival order.
//! The refresh runs on its own task, so a caller that gives up cannot leave
//! the queue behind.

use async_trait::async_trait;
use fepa_core::{SessionStore, TokenPair};
use reqwest::{Client, header};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, oneshot};

use super::error::{ApiError, RefreshFailure};
use super::events::AuthEvent;
use crate::types::{Envelope, RefreshRequest, RefreshResponse};

/// Exchanges a refresh token for a new credential pair
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshFailure>;
}

type Waiter = oneshot::Sender<Result<String, RefreshFailure>>;

enum RefreshState {
    Idle,
    /// Waiters in the order their 401s were observed
    Refreshing(Vec<Waiter>),
    /// The last cycle failed and credentials were cleared
    Expired(RefreshFailure),
}

struct Inner {
    state: Mutex<RefreshState>,
    session: SessionStore,
    refresher: Arc<dyn TokenRefresher>,
    events: broadcast::Sender<AuthEvent>,
}

/// Per-client refresh state machine
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        session: SessionStore,
        refresher: Arc<dyn TokenRefresher>,
        events: broadcast::Sender<AuthEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RefreshState::Idle),
                session,
                refresher,
                events,
            }),
        }
    }

    pub async fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock().await, RefreshState::Refreshing(_))
    }

    /// Obtain an access token to replay a request that was rejected with 401.
    ///
    /// `rejected_token` is the access token the request carried. If the
    /// stored token has changed since, another refresh already replaced it
    /// and the current token is returned without a new refresh call.
    ///
    /// A 401 that lands after a failed cycle cleared the credentials gets
    /// that cycle's failure; the session is not expired a second time.
    pub async fn recover(&self, rejected_token: Option<&str>) -> Result<String, RefreshFailure> {
        let rx = {
            let mut state = self.inner.state.lock().await;
            let (tx, rx) = oneshot::channel();

            if let RefreshState::Refreshing(waiters) = &mut *state {
                waiters.push(tx);
                debug!(queued = waiters.len(), "Refresh in flight, queueing request");
            } else {
                let current = self
                    .inner
                    .session
                    .access_token()
                    .await
                    .map_err(|err| RefreshFailure::Storage(err.to_string()))?;

                match current {
                    Some(current) if rejected_token != Some(current.as_str()) => {
                        debug!("Token already replaced, replaying without refresh");
                        return Ok(current);
                    }
                    Some(_) => {}
                    None => {
                        if let RefreshState::Expired(reason) = &*state {
                            debug!(%reason, "Session already expired");
                            return Err(reason.clone());
                        }
                        if rejected_token.is_some() {
                            debug!("Credentials cleared since the request was sent");
                            return Err(RefreshFailure::MissingRefreshToken);
                        }
                    }
                }

                *state = RefreshState::Refreshing(vec![tx]);
                debug!("Starting token refresh");
                self.spawn_refresh();
            }
            rx
        };

        rx.await.unwrap_or(Err(RefreshFailure::Abandoned))
    }

    fn spawn_refresh(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let worker = Arc::clone(&inner);
            // A panicking refresher still settles the queue
            let outcome = tokio::spawn(async move { worker.refresh_once().await })
                .await
                .unwrap_or(Err(RefreshFailure::Abandoned));
            inner.settle(outcome).await;
        });
    }
}

impl Inner {
    async fn refresh_once(&self) -> Result<String, RefreshFailure> {
        let refresh_token = self
            .session
            .refresh_token()
            .await
            .map_err(|err| RefreshFailure::Storage(err.to_string()))?
            .filter(|token| !token.is_empty())
            .ok_or(RefreshFailure::MissingRefreshToken)?;

        let tokens = self.refresher.refresh(&refresh_token).await?;
        self.session
            .store_tokens(&tokens)
            .await
            .map_err(|err| RefreshFailure::Storage(err.to_string()))?;

        Ok(tokens.access_token)
    }

    async fn settle(&self, outcome: Result<String, RefreshFailure>) {
        match &outcome {
            Ok(_) => {
                info!("Access token refreshed");
                let _ = self.events.send(AuthEvent::TokensRefreshed);
            }
            Err(reason) => {
                warn!(%reason, "Token refresh failed, clearing credentials");
                if let Err(err) = self.session.clear_credentials().await {
                    error!(error = %err, "Failed to clear credentials");
                }
                let _ = self.events.send(AuthEvent::SessionExpired {
                    reason: reason.clone(),
                });
            }
        }

        let next = match &outcome {
            Ok(_) => RefreshState::Idle,
            Err(reason) => RefreshState::Expired(reason.clone()),
        };
        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, next) {
                RefreshState::Refreshing(waiters) => waiters,
                RefreshState::Idle | RefreshState::Expired(_) => Vec::new(),
            }
        };

        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "Draining refresh queue");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Refresher that calls `POST /auth/refresh` on the admin API
pub struct HttpTokenRefresher {
    client: Client,
    url: String,
}

impl HttpTokenRefresher {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{base_url}/auth/refresh"),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshFailure> {
        let response = self
            .client
            .post(&self.url)
            .header(header::ACCEPT, "application/json")
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await
            .map_err(|err| RefreshFailure::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| RefreshFailure::Transport(err.to_string()))?;

        if !status.is_success() {
            let error = ApiError::from_response(status, self.url.as_str(), &body);
            return Err(RefreshFailure::Rejected {
                status: error.status,
                message: error.message,
            });
        }

        let envelope: Envelope<RefreshResponse> =
            serde_json::from_str(&body).map_err(|err| RefreshFailure::Rejected {
                status: status.as_u16(),
                message: format!("malformed refresh response: {err}"),
            })?;

        let data = envelope.data;
        Ok(TokenPair::new(
            data.access_token,
            data.refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        ))
    }
}
