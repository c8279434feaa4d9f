//! Push messages and the notifications they produce.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::NotificationDefaults;
use crate::WorkerError;

/// Action id that navigates to the target URL.
pub const ACTION_OPEN: &str = "open";
/// Action id that only dismisses.
pub const ACTION_CLOSE: &str = "close";

/// Push message body. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
}

impl PushPayload {
    pub fn parse(data: &[u8]) -> Result<Self, WorkerError> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    pub fn new(action: &str, title: &str) -> Self {
        Self {
            action: action.to_string(),
            title: title.to_string(),
        }
    }
}

/// Display options, mirroring `showNotification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// Target URL, carried as notification data.
    pub url: String,
    pub actions: Vec<NotificationAction>,
}

impl NotificationOptions {
    /// Fill a payload's missing fields from the defaults.
    pub fn from_payload(payload: &PushPayload, defaults: &NotificationDefaults) -> Self {
        Self {
            body: non_empty(&payload.body).unwrap_or(&defaults.body).to_string(),
            icon: defaults.icon.clone(),
            badge: defaults.badge.clone(),
            vibrate: defaults.vibrate.clone(),
            url: non_empty(&payload.url).unwrap_or(&defaults.url).to_string(),
            actions: defaults.actions.clone(),
        }
    }
}

/// Title to display, falling back to the default.
pub fn title_or_default<'a>(payload: &'a PushPayload, defaults: &'a NotificationDefaults) -> &'a str {
    non_empty(&payload.title).unwrap_or(&defaults.title)
}

// Empty strings count as missing.
fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// A displayed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub options: NotificationOptions,
}

/// A click on a notification, or on one of its action buttons.
#[derive(Debug, Clone)]
pub struct NotificationClick {
    pub notification: Notification,
    /// Action id; `None` for a click on the body.
    pub action: Option<String>,
}

/// What a click resulted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The close action; nothing else happens.
    Dismissed,
    /// An existing page was navigated and focused.
    Focused { client_id: String },
    /// A new page was opened.
    Opened { client_id: String },
}

/// Where notifications are shown.
#[async_trait]
pub trait NotificationCenter: Send + Sync {
    async fn show(
        &self,
        title: &str,
        options: NotificationOptions,
    ) -> Result<Notification, WorkerError>;

    async fn close(&self, id: u64);
}

/// In-memory [`NotificationCenter`] that records what is on screen.
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    visible: Arc<RwLock<Vec<Notification>>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications currently visible, oldest first.
    pub async fn visible(&self) -> Vec<Notification> {
        self.visible.read().await.clone()
    }
}

#[async_trait]
impl NotificationCenter for NotificationLog {
    async fn show(
        &self,
        title: &str,
        options: NotificationOptions,
    ) -> Result<Notification, WorkerError> {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let notification = Notification {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            title: title.to_string(),
            options,
        };
        self.visible.write().await.push(notification.clone());
        Ok(notification)
    }

    async fn close(&self, id: u64) {
        self.visible.write().await.retain(|n| n.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_fields_optional() {
        let payload = PushPayload::parse(br#"{"title":"Drop"}"#).unwrap();
        assert_eq!(payload.title.as_deref(), Some("Drop"));
        assert!(payload.body.is_none());
        assert!(payload.url.is_none());

        assert_eq!(PushPayload::parse(b"{}").unwrap(), PushPayload::default());
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(
            PushPayload::parse(b"not json"),
            Err(WorkerError::Payload(_))
        ));
    }

    #[test]
    fn test_options_defaults() {
        let defaults = NotificationDefaults::default();
        let options = NotificationOptions::from_payload(&PushPayload::default(), &defaults);

        assert_eq!(options.body, "¡Tenemos novedades para ti!");
        assert_eq!(options.url, "/");
        assert_eq!(options.vibrate, vec![100, 50, 100]);
        assert_eq!(options.actions[0].action, ACTION_OPEN);
        assert_eq!(options.actions[1].action, ACTION_CLOSE);
        assert!(options.icon.starts_with("data:image/svg+xml"));
    }

    #[test]
    fn test_options_from_payload() {
        let payload = PushPayload {
            title: None,
            body: Some("Nueva gorra".into()),
            url: Some("/drops/42".into()),
        };
        let options = NotificationOptions::from_payload(&payload, &NotificationDefaults::default());
        assert_eq!(options.body, "Nueva gorra");
        assert_eq!(options.url, "/drops/42");
    }

    #[test]
    fn test_empty_fields_take_defaults() {
        let defaults = NotificationDefaults::default();
        let payload = PushPayload {
            title: Some(String::new()),
            body: Some(String::new()),
            url: None,
        };
        assert_eq!(title_or_default(&payload, &defaults), "CAPS KINGDOM");
        let options = NotificationOptions::from_payload(&payload, &defaults);
        assert_eq!(options.body, defaults.body);
    }

    #[tokio::test]
    async fn test_log_show_and_close() {
        let log = NotificationLog::new();
        let options =
            NotificationOptions::from_payload(&PushPayload::default(), &NotificationDefaults::default());
        let first = log.show("A", options.clone()).await.unwrap();
        let second = log.show("B", options).await.unwrap();
        assert_ne!(first.id, second.id);

        log.close(first.id).await;
        let visible = log.visible().await;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "B");
    }
}
