//! User-visible feedback emitted by the stores.
//!
//! Stores never render anything themselves; they hand a [`Notification`] to
//! a [`NotificationSink`] and forget about it.

use std::sync::{Arc, Mutex};

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Destructive,
}

/// What happened to the operation that produced the notification.
///
/// - `Loaded`: hydration finished and the collection is ready
/// - `Success`: the mutation was applied
/// - `Blocked`: validation rejected the mutation before any state changed
/// - `Failed`: loading or persisting failed
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Loaded,
    Success,
    Blocked,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub kind: NotificationKind,
    pub title: String,
    pub description: Option<String>,
}

impl Notification {
    pub fn loaded(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            kind: NotificationKind::Loaded,
            title: title.into(),
            description: Some(description.into()),
        }
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            kind: NotificationKind::Success,
            title: title.into(),
            description: None,
        }
    }

    pub fn blocked(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Destructive,
            kind: NotificationKind::Blocked,
            title: title.into(),
            description: Some(description.into()),
        }
    }

    pub fn failed(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Destructive,
            kind: NotificationKind::Failed,
            title: title.into(),
            description: Some(description.into()),
        }
    }
}

/// Fire-and-forget receiver of notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Keeps every notification in memory, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().expect("notification lock poisoned").clone()
    }

    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.all().into_iter().filter(|n| n.kind == kind).collect()
    }

    pub fn clear(&self) {
        self.seen.lock().expect("notification lock poisoned").clear();
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .expect("notification lock poisoned")
            .push(notification);
    }
}
