//! Notification state shared by polling, push events, and explicit actions

pub mod cache;
pub mod events;
pub mod poller;
#[cfg(feature = "socket")]
pub mod socket;

pub use cache::NotificationCache;
pub use events::{PushEvent, ReadScope};
pub use poller::spawn_poller;
#[cfg(feature = "socket")]
pub use socket::{listen, listen_with_reconnect};

use crate::client::{AdminClient, ClientError};
use crate::types::NotificationQuery;
use fepa_core::Notification;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

const PUSH_CHANNEL_CAPACITY: usize = 64;

/// Notification facade over the admin client and the shared cache
#[derive(Clone)]
pub struct NotificationCenter {
    client: AdminClient,
    cache: Arc<Mutex<NotificationCache>>,
    query: NotificationQuery,
    pushes: broadcast::Sender<PushEvent>,
}

impl NotificationCenter {
    pub fn new(client: AdminClient) -> Self {
        Self::with_query(client, NotificationQuery::default())
    }

    /// Use `query` whenever the cached list is (re)fetched
    pub fn with_query(client: AdminClient, query: NotificationQuery) -> Self {
        let (pushes, _) = broadcast::channel(PUSH_CHANNEL_CAPACITY);
        Self {
            client,
            cache: Arc::new(Mutex::new(NotificationCache::new())),
            query,
            pushes,
        }
    }

    pub const fn client(&self) -> &AdminClient {
        &self.client
    }

    /// Every push event after it has been merged into the cache
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.pushes.subscribe()
    }

    /// Cached unread count, without a network call
    pub async fn unread_count(&self) -> u64 {
        self.cache.lock().await.unread_count()
    }

    pub async fn snapshot(&self) -> NotificationCache {
        self.cache.lock().await.clone()
    }

    /// Replace the cached unread count with the server's value
    pub async fn poll_unread(&self) -> Result<u64, ClientError> {
        let count = self.client.unread_notification_count().await?;
        self.cache.lock().await.set_unread_count(count);
        debug!(count, "Polled unread count");
        Ok(count)
    }

    /// Cached list, re-fetched when a push or action invalidated it
    pub async fn notifications(&self) -> Result<Vec<Notification>, ClientError> {
        if let Some(items) = self.cache.lock().await.items() {
            return Ok(items.to_vec());
        }
        self.reload().await
    }

    /// Fetch the list from the server regardless of cache state
    pub async fn reload(&self) -> Result<Vec<Notification>, ClientError> {
        let page = self.client.list_notifications(self.query).await?;
        let mut cache = self.cache.lock().await;
        if let Some(count) = page.unread_count {
            cache.set_unread_count(count);
        }
        cache.replace_items(page.notifications.clone());
        Ok(page.notifications)
    }

    /// Mark one notification read, optimistically flipping the cached flag
    pub async fn mark_as_read(&self, id: &str) -> Result<(), ClientError> {
        let previous = self.cache.lock().await.mark_read_optimistic(id);

        match self.client.mark_notification_read(id).await {
            Ok(()) => {
                self.cache.lock().await.confirm_read(previous);
                Ok(())
            }
            Err(err) => {
                self.cache.lock().await.revert_read(id, previous);
                Err(err)
            }
        }
    }

    pub async fn mark_all_as_read(&self) -> Result<(), ClientError> {
        self.client.mark_all_notifications_read().await?;
        self.cache.lock().await.mark_all_read();
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.client.delete_notification(id).await?;
        self.cache.lock().await.remove(id);
        self.resync_count().await;
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<(), ClientError> {
        self.client.delete_all_notifications().await?;
        self.cache.lock().await.clear();
        self.resync_count().await;
        Ok(())
    }

    /// Re-poll the count after a delete; the delete itself already succeeded
    async fn resync_count(&self) {
        if let Err(err) = self.poll_unread().await {
            warn!(error = %err, "Could not refresh unread count after delete");
        }
    }

    /// Merge a push event and forward it to subscribers
    pub async fn handle_push(&self, event: PushEvent) {
        debug!(event = event.name(), "Push event");
        self.cache.lock().await.apply(&event);
        // No subscribers is fine
        let _ = self.pushes.send(event);
    }
}
