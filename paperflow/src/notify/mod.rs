//! User-facing notifications.
//!
//! Every terminal stage outcome produces exactly one notification. Loading
//! notices are informational and do not count toward that.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// A stage call was issued ("Generating audio...").
    Loading,
    /// Neutral information.
    Info,
    /// A stage succeeded.
    Success,
    /// A stage or validation failed.
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to display.
    pub message: String,
    /// The stage the notice concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// When it was raised.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Creates a notification stamped now.
    #[must_use]
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            stage: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a success notification.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    /// Creates an error notification.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    /// Creates a loading notification.
    #[must_use]
    pub fn loading(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Loading, message)
    }

    /// Tags the notification with a stage key.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }
}

/// Delivers notifications to the user.
pub trait Notifier: Send + Sync {
    /// Shows a notification. Must not block.
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let stage = notification.stage.as_deref().unwrap_or("-");
        match notification.level {
            NoticeLevel::Error => error!(stage, level = %notification.level, "{}", notification.message),
            _ => info!(stage, level = %notification.level, "{}", notification.message),
        }
    }
}

/// Keeps notifications in memory.
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: RwLock<Vec<Notification>>,
}

impl NotificationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notification in order.
    #[must_use]
    pub fn entries(&self) -> Vec<Notification> {
        self.entries.read().clone()
    }

    /// Returns notifications of the given level.
    #[must_use]
    pub fn of_level(&self, level: NoticeLevel) -> Vec<Notification> {
        self.entries
            .read()
            .iter()
            .filter(|n| n.level == level)
            .cloned()
            .collect()
    }

    /// Returns error notifications.
    #[must_use]
    pub fn errors(&self) -> Vec<Notification> {
        self.of_level(NoticeLevel::Error)
    }

    /// Returns success and error notifications, skipping loading and info.
    #[must_use]
    pub fn outcomes(&self) -> Vec<Notification> {
        self.entries
            .read()
            .iter()
            .filter(|n| matches!(n.level, NoticeLevel::Success | NoticeLevel::Error))
            .cloned()
            .collect()
    }

    /// Returns the messages of all notifications.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries.read().iter().map(|n| n.message.clone()).collect()
    }

    /// Removes everything.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        self.entries.write().push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filters_outcomes() {
        let log = NotificationLog::new();
        log.notify(Notification::loading("Generating audio...").with_stage("audio"));
        log.notify(Notification::success("Audio ready - generating video...").with_stage("audio"));
        log.notify(Notification::error("Video generation failed").with_stage("video"));

        assert_eq!(log.entries().len(), 3);
        assert_eq!(log.outcomes().len(), 2);
        assert_eq!(log.errors()[0].message, "Video generation failed");
        assert_eq!(log.errors()[0].stage.as_deref(), Some("video"));
    }

    #[test]
    fn test_tracing_notifier_does_not_panic() {
        TracingNotifier.notify(Notification::error("Audio generation failed"));
        TracingNotifier.notify(Notification::success("done"));
    }

    #[test]
    fn test_notification_serializes_level() {
        let json = serde_json::to_value(Notification::success("ok")).unwrap();
        assert_eq!(json["level"], "success");
        assert!(json.get("stage").is_none());
    }
}
