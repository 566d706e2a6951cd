//! FEPA admin API client
//!
//! [`AdminClient`] attaches credentials, sanitizes bodies, and recovers from
//! expired access tokens through a per-client [`RefreshCoordinator`].

pub mod auth;
pub mod error;
pub mod events;
pub mod notifications;
pub mod refresh;
pub mod request;

pub use error::{ApiError, ClientError, HttpErrorKind, RefreshFailure};
pub use events::AuthEvent;
pub use refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};
pub use request::ApiRequest;
pub use reqwest::Method;

use crate::types::Envelope;
use fepa_core::SessionStore;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Header carrying the anti-forgery token in both directions
pub const CSRF_HEADER: &str = "x-csrf-token";

const DEFAULT_USER_AGENT: &str = concat!("fepa-admin/", env!("CARGO_PKG_VERSION"));
const DEFAULT_EVENT_CAPACITY: usize = 16;

struct ClientInner {
    http: Client,
    base_url: String,
    session: SessionStore,
    refresh: RefreshCoordinator,
    events: broadcast::Sender<AuthEvent>,
}

/// FEPA admin API client
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<ClientInner>,
}

impl AdminClient {
    /// Create a new client with in-memory session storage
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> AdminClientBuilder {
        AdminClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Session storage used for credentials
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    /// Subscribe to login, refresh, expiry, and logout events
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.inner.base_url, path)
        } else {
            format!("{}/{}", self.inner.base_url, path)
        }
    }

    /// Send a request and decode the body as `T`
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let (url, body) = self.send_raw(request).await?;
        decode(&url, &body)
    }

    /// Send a request whose response is wrapped in the standard envelope
    pub async fn send_enveloped<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        let envelope: Envelope<T> = self.send(request).await?;
        Ok(envelope.data)
    }

    /// Send a request and ignore the response body
    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ClientError> {
        self.send_raw(request).await.map(|_| ())
    }

    /// Execute `request`, refreshing credentials once on 401.
    ///
    /// Returns the request URL and the raw body of the 2xx response.
    async fn send_raw(&self, mut request: ApiRequest) -> Result<(String, String), ClientError> {
        let public = request.is_public();
        let mut token = if public {
            None
        } else {
            self.inner.session.access_token().await?
        };

        loop {
            let url = self.url(&request.path);
            let response = self.dispatch(&request, &url, token.as_deref()).await?;
            let status = response.status();
            self.capture_csrf(response.headers()).await;

            let body = response
                .text()
                .await
                .map_err(|source| ClientError::Network {
                    url: url.clone(),
                    source,
                })?;

            if status.is_success() {
                debug!(method = %request.method, %url, %status, "Request succeeded");
                return Ok((url, body));
            }

            if status == StatusCode::UNAUTHORIZED && !public && !request.retried {
                debug!(method = %request.method, %url, "Unauthorized, recovering credentials");
                let fresh = self
                    .inner
                    .refresh
                    .recover(token.as_deref())
                    .await
                    .map_err(ClientError::RefreshFailed)?;
                request.retried = true;
                token = Some(fresh);
                continue;
            }

            return Err(reject(status, url, &body));
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        url: &str,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .header(header::ACCEPT, "application/json")
            .headers(request.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if !request.is_public() {
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            if request.is_mutating() {
                if let Some(csrf) = self.inner.session.csrf_token().await? {
                    builder = builder.header(CSRF_HEADER, csrf);
                }
            }
        }

        if let Some(body) = request.sanitized_body() {
            builder = builder.json(&body);
        }

        builder.send().await.map_err(|source| ClientError::Network {
            url: url.to_string(),
            source,
        })
    }

    async fn capture_csrf(&self, headers: &HeaderMap) {
        let Some(token) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) else {
            return;
        };
        if let Err(err) = self.inner.session.set_csrf_token(token.to_string()).await {
            warn!(error = %err, "Failed to store CSRF token");
        }
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ClientError> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|source| ClientError::Decode {
        url: url.to_string(),
        source,
    })
}

fn reject(status: StatusCode, url: String, body: &str) -> ClientError {
    let error = ApiError::from_response(status, url, body);
    match error.kind() {
        HttpErrorKind::Forbidden | HttpErrorKind::NotFound => {
            warn!(
                status = error.status,
                url = %error.url,
                message = %error.message,
                "Request refused"
            );
        }
        HttpErrorKind::Server => {
            error!(
                status = error.status,
                url = %error.url,
                message = %error.message,
                "Server error"
            );
        }
        HttpErrorKind::BadRequest | HttpErrorKind::Unauthorized | HttpErrorKind::Client => {
            debug!(
                status = error.status,
                url = %error.url,
                message = %error.message,
                "Request rejected"
            );
        }
    }
    ClientError::Api(error)
}

/// Builder for AdminClient
#[derive(Default)]
pub struct AdminClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    session: Option<SessionStore>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl AdminClientBuilder {
    /// Set the base URL, including any API prefix such as `/api`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use `session` for credentials instead of a fresh in-memory store
    pub fn session(mut self, session: SessionStore) -> Self {
        self.session = Some(session);
        self
    }

    /// Replace the refresh call, mainly for tests
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<AdminClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|err| ClientError::Configuration(format!("invalid base_url: {err}")))?;

        let mut client_builder = ClientBuilder::new();
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let user_agent = HeaderValue::from_str(&user_agent)
            .map_err(|err| ClientError::Configuration(format!("invalid user agent: {err}")))?;
        client_builder = client_builder.user_agent(user_agent);

        let http = client_builder
            .build()
            .map_err(|err| ClientError::Configuration(err.to_string()))?;

        let session = self.session.unwrap_or_else(SessionStore::in_memory);
        let refresher = self
            .refresher
            .unwrap_or_else(|| Arc::new(HttpTokenRefresher::new(http.clone(), &base_url)));
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        let refresh = RefreshCoordinator::new(session.clone(), refresher, events.clone());

        Ok(AdminClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                session,
                refresh,
                events,
            }),
        })
    }
}
