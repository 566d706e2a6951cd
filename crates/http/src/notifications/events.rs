//! Push events delivered over the notification socket

use fepa_core::Notification;
use serde::Deserialize;
use serde_json::Value;

pub const NOTIFICATION_NEW: &str = "notification:new";
pub const NOTIFICATION_UNREAD_COUNT: &str = "notification:unread-count";
pub const NOTIFICATION_READ: &str = "notification:read";
pub const SYSTEM_ALERT: &str = "system:alert";
pub const USER_ACTIVITY: &str = "user:activity";

/// Wire frame: `{ "event": "...", "data": ... }`
#[derive(Debug, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct CountPayload {
    count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadPayload {
    #[serde(default, alias = "notificationId")]
    id: Option<String>,
    #[serde(default)]
    all: bool,
}

/// What a read event marked as read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadScope {
    One(String),
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    NotificationNew(Notification),
    UnreadCount(u64),
    NotificationRead(ReadScope),
    SystemAlert(Value),
    UserActivity(Value),
}

impl PushEvent {
    /// Parse a text frame.
    ///
    /// Returns `Ok(None)` for event names this client does not handle.
    pub fn parse(text: &str) -> Result<Option<Self>, serde_json::Error> {
        let frame: Frame = serde_json::from_str(text)?;
        let event = match frame.event.as_str() {
            NOTIFICATION_NEW => Self::NotificationNew(serde_json::from_value(frame.data)?),
            NOTIFICATION_UNREAD_COUNT => {
                let payload: CountPayload = serde_json::from_value(frame.data)?;
                Self::UnreadCount(payload.count)
            }
            NOTIFICATION_READ => {
                let payload: ReadPayload = if frame.data.is_null() {
                    ReadPayload::default()
                } else {
                    serde_json::from_value(frame.data)?
                };
                match payload.id {
                    Some(id) if !payload.all => Self::NotificationRead(ReadScope::One(id)),
                    _ => Self::NotificationRead(ReadScope::All),
                }
            }
            SYSTEM_ALERT => Self::SystemAlert(frame.data),
            USER_ACTIVITY => Self::UserActivity(frame.data),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotificationNew(_) => NOTIFICATION_NEW,
            Self::UnreadCount(_) => NOTIFICATION_UNREAD_COUNT,
            Self::NotificationRead(_) => NOTIFICATION_READ,
            Self::SystemAlert(_) => SYSTEM_ALERT,
            Self::UserActivity(_) => USER_ACTIVITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fepa_core::NotificationKind;

    #[test]
    fn parses_new_notification() {
        let text = r#"{
            "event": "notification:new",
            "data": {
                "_id": "n9",
                "type": "system",
                "title": "Maintenance",
                "message": "Tonight at 2am",
                "isRead": false,
                "createdAt": "2024-05-01T00:00:00Z"
            }
        }"#;

        let Some(PushEvent::NotificationNew(notification)) = PushEvent::parse(text).unwrap()
        else {
            panic!("expected notification:new");
        };
        assert_eq!(notification.id, "n9");
        assert_eq!(notification.kind, NotificationKind::System);
    }

    #[test]
    fn parses_read_scopes() {
        assert_eq!(
            PushEvent::parse(r#"{"event":"notification:read","data":{"notificationId":"n1"}}"#)
                .unwrap(),
            Some(PushEvent::NotificationRead(ReadScope::One("n1".into())))
        );
        assert_eq!(
            PushEvent::parse(r#"{"event":"notification:read","data":{"all":true}}"#).unwrap(),
            Some(PushEvent::NotificationRead(ReadScope::All))
        );
        assert_eq!(
            PushEvent::parse(r#"{"event":"notification:read"}"#).unwrap(),
            Some(PushEvent::NotificationRead(ReadScope::All))
        );
    }

    #[test]
    fn unknown_events_are_skipped_and_bad_payloads_fail() {
        assert_eq!(
            PushEvent::parse(r#"{"event":"chat:typing","data":{}}"#).unwrap(),
            None
        );
        assert!(
            PushEvent::parse(r#"{"event":"notification:unread-count","data":{"count":-1}}"#)
                .is_err()
        );
        assert!(PushEvent::parse("not json").is_err());
    }
}
