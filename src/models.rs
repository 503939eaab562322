//! Wire types exchanged with the REST API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Text shown for a notification whose payload carries no message.
pub const FALLBACK_NOTIFICATION_MESSAGE: &str = "Notification";

/// Identifier assigned by the notification service.
///
/// The service may hand out either numbers or strings; both are kept in the
/// form they arrived in so the acknowledgment URL matches exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotificationId {
    Number(i64),
    Text(String),
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationId::Number(n) => write!(f, "{n}"),
            NotificationId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for NotificationId {
    fn from(n: i64) -> Self {
        NotificationId::Number(n)
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        NotificationId::Text(s.to_string())
    }
}

/// Body of a notification. Only `message` is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A notification as delivered by `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(default)]
    pub payload: NotificationPayload,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    /// Text to show for this notification.
    ///
    /// ```
    /// use leadflow::{Notification, NotificationId, NotificationPayload};
    /// let n = Notification {
    ///     id: NotificationId::Number(7),
    ///     payload: NotificationPayload::default(),
    ///     read: false,
    /// };
    /// assert_eq!(n.display_message(), "Notification");
    /// ```
    pub fn display_message(&self) -> &str {
        match self.payload.message.as_deref() {
            Some(msg) if !msg.is_empty() => msg,
            _ => FALLBACK_NOTIFICATION_MESSAGE,
        }
    }
}

/// A lead discovered by a search or import, pending curation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LeadCandidate {
    /// Short human label: name, then company, then email, then website.
    pub fn label(&self) -> &str {
        [&self.name, &self.company, &self.email, &self.website]
            .into_iter()
            .find_map(|f| f.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("(unnamed lead)")
    }
}

/// Response of the lead creation endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkCreated {
    #[serde(default)]
    pub ids: Vec<Value>,
}
