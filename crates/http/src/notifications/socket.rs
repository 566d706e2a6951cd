//! WebSocket push channel for notification events

use super::{NotificationCenter, PushEvent};
use crate::client::ClientError;
use futures::StreamExt;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_util::sync::CancellationToken;

/// Connect once and merge push events into `center` until the server closes
/// the socket or `shutdown` fires.
///
/// The handshake carries the same bearer token as API requests.
pub async fn listen(
    center: &NotificationCenter,
    socket_url: &str,
    shutdown: &CancellationToken,
) -> Result<(), ClientError> {
    let token = center
        .client()
        .session()
        .access_token()
        .await?
        .ok_or_else(|| ClientError::Socket("not authenticated".into()))?;

    let mut request = socket_url
        .into_client_request()
        .map_err(|err| ClientError::Socket(err.to_string()))?;
    let auth = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|err| ClientError::Socket(err.to_string()))?;
    request.headers_mut().insert("authorization", auth);

    let (mut stream, _) = connect_async(request)
        .await
        .map_err(|err| ClientError::Socket(err.to_string()))?;
    info!(url = socket_url, "Notification socket connected");

    loop {
        let message = tokio::select! {
            () = shutdown.cancelled() => {
                let _ = stream.close(None).await;
                return Ok(());
            }
            message = stream.next() => message,
        };

        let Some(message) = message else {
            debug!("Notification socket ended");
            return Ok(());
        };

        match message.map_err(|err| ClientError::Socket(err.to_string()))? {
            Message::Text(text) => match PushEvent::parse(text.as_str()) {
                Ok(Some(event)) => center.handle_push(event).await,
                Ok(None) => debug!("Ignoring unhandled socket event"),
                Err(err) => warn!(error = %err, "Malformed socket event"),
            },
            Message::Close(_) => {
                debug!("Notification socket closed by server");
                return Ok(());
            }
            _ => {}
        }
    }
}

/// Keep a socket connected, reconnecting after `retry_delay` on failure.
///
/// Returns when `shutdown` fires or there is no session to authenticate with.
pub async fn listen_with_reconnect(
    center: NotificationCenter,
    socket_url: String,
    retry_delay: Duration,
    shutdown: CancellationToken,
) {
    while !shutdown.is_cancelled() {
        match center.client().session().is_authenticated().await {
            Ok(true) => {}
            Ok(false) => {
                info!("No session, notification socket not started");
                return;
            }
            Err(err) => {
                warn!(error = %err, "Could not read session");
                return;
            }
        }

        if let Err(err) = listen(&center, &socket_url, &shutdown).await {
            warn!(error = %err, "Notification socket failed");
        }

        tokio::select! {
            () = shutdown.cancelled() => return,
            () = tokio::time::sleep(retry_delay) => {}
        }
    }
}
