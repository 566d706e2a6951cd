//! Notification API client methods

use super::{AdminClient, ApiRequest, ClientError};
use crate::types::{NotificationPage, NotificationQuery, UnreadCount};

impl AdminClient {
    /// List notifications for the current user
    pub async fn list_notifications(
        &self,
        query: NotificationQuery,
    ) -> Result<NotificationPage, ClientError> {
        let mut request = ApiRequest::get("/notifications");
        if let Some(page) = query.page {
            request = request.query("page", page);
        }
        if let Some(limit) = query.limit {
            request = request.query("limit", limit);
        }
        if query.unread_only {
            request = request.query("unreadOnly", true);
        }
        self.send_enveloped(request).await
    }

    pub async fn unread_notification_count(&self) -> Result<u64, ClientError> {
        let count: UnreadCount = self
            .send_enveloped(ApiRequest::get("/notifications/unread-count"))
            .await?;
        Ok(count.count)
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::patch(format!("/notifications/{id}/read")))
            .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::patch("/notifications/read-all"))
            .await
    }

    pub async fn delete_notification(&self, id: &str) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::delete(format!("/notifications/{id}")))
            .await
    }

    pub async fn delete_all_notifications(&self) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::delete("/notifications")).await
    }
}
