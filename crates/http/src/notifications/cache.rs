//! Client-side notification state merged from polling and push events

use super::events::{PushEvent, ReadScope};
use fepa_core::Notification;

/// Cached unread count and notification list.
///
/// The count is unsigned and only ever decremented with saturation, so it
/// cannot go below zero. A `None` list means the next read must re-fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationCache {
    unread: u64,
    items: Option<Vec<Notification>>,
}

impl NotificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn unread_count(&self) -> u64 {
        self.unread
    }

    pub fn items(&self) -> Option<&[Notification]> {
        self.items.as_deref()
    }

    pub const fn is_stale(&self) -> bool {
        self.items.is_none()
    }

    pub fn set_unread_count(&mut self, count: u64) {
        self.unread = count;
    }

    pub fn replace_items(&mut self, items: Vec<Notification>) {
        self.items = Some(items);
    }

    pub fn invalidate(&mut self) {
        self.items = None;
    }

    /// Merge a push event into the cache
    pub fn apply(&mut self, event: &PushEvent) {
        match event {
            PushEvent::NotificationNew(notification) => {
                if !notification.read {
                    self.unread = self.unread.saturating_add(1);
                }
                self.invalidate();
            }
            PushEvent::UnreadCount(count) => self.unread = *count,
            PushEvent::NotificationRead(ReadScope::One(_) | ReadScope::All) => self.invalidate(),
            PushEvent::SystemAlert(_) | PushEvent::UserActivity(_) => {}
        }
    }

    /// Flip the read flag before the server confirms.
    ///
    /// Returns the previous flag, or `None` when the item is not cached.
    pub fn mark_read_optimistic(&mut self, id: &str) -> Option<bool> {
        let item = self.items.as_mut()?.iter_mut().find(|n| n.id == id)?;
        Some(std::mem::replace(&mut item.read, true))
    }

    /// Server confirmed a mark-as-read; `was_read` is the flag before it
    pub fn confirm_read(&mut self, was_read: Option<bool>) {
        if !matches!(was_read, Some(true)) {
            self.unread = self.unread.saturating_sub(1);
        }
    }

    /// Server refused a mark-as-read; restore the previous flag
    pub fn revert_read(&mut self, id: &str, was_read: Option<bool>) {
        let Some(was_read) = was_read else {
            return;
        };
        if let Some(item) = self
            .items
            .as_mut()
            .and_then(|items| items.iter_mut().find(|n| n.id == id))
        {
            item.read = was_read;
        }
    }

    pub fn mark_all_read(&mut self) {
        self.unread = 0;
        self.invalidate();
    }

    /// Remove a deleted item; decrements the count if it was unread
    pub fn remove(&mut self, id: &str) {
        let was_unread = self
            .items
            .as_ref()
            .and_then(|items| items.iter().find(|n| n.id == id))
            .is_some_and(|n| !n.read);
        if was_unread {
            self.unread = self.unread.saturating_sub(1);
        }
        self.invalidate();
    }

    /// Everything was deleted; nothing can be unread
    pub fn clear(&mut self) {
        self.unread = 0;
        self.invalidate();
    }
}
