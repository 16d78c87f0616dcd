//! Notification dispatch

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

/// One workflow notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
}

impl NotificationEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

/// Fire-and-forget event sink; delivery failures stay inside the implementation
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn emit(&self, event: NotificationEvent);
}

/// Writes notifications to the log
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn emit(&self, event: NotificationEvent) {
        match event.kind {
            NotificationKind::Error => error!(kind = "error", "{}", event.message),
            NotificationKind::Success => info!(kind = "success", "{}", event.message),
            NotificationKind::Info => info!(kind = "info", "{}", event.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_type_field() {
        let value = serde_json::to_value(NotificationEvent::success("done")).unwrap();
        assert_eq!(value["type"], "success");
        assert_eq!(value["message"], "done");
    }

    #[test]
    fn test_tracing_notifier_never_fails() {
        tokio_test::block_on(TracingNotifier.emit(NotificationEvent::error("boom")));
    }
}
