//! Notification model - messages produced by workflow transitions.

use serde::{Deserialize, Serialize};
use crate::id::{NotificationId, UserId};
use crate::Time;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Informational
    Info,
    /// Something good happened
    Success,
    /// Needs attention
    Warning,
    /// Something failed
    Error,
}

impl NotificationType {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Success => "success",
            NotificationType::Warning => "warning",
            NotificationType::Error => "error",
        }
    }
}

/// A message for one user. Only `read` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier
    pub id: NotificationId,

    /// Recipient
    pub owner_id: UserId,

    /// Short title
    pub title: String,

    /// Body text
    pub message: String,

    /// Severity
    #[serde(rename = "type")]
    pub kind: NotificationType,

    /// Whether the recipient has seen it
    pub read: bool,

    /// When created
    pub created_at: Time,
}

impl Notification {
    /// Create an unread notification.
    pub fn new(
        owner_id: UserId,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        now: Time,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            owner_id,
            title: title.into(),
            message: message.into(),
            kind,
            read: false,
            created_at: now,
        }
    }
}
