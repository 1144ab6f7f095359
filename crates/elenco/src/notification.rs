use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

/// Transient inline message shown next to a list or item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    /// Server payload behind the message, unmodified.
    pub detail: Option<Value>,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
            detail: None,
            raised_at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
            detail: None,
            raised_at: Utc::now(),
        }
    }

    pub fn from_transport(err: &TransportError) -> Self {
        Self {
            detail: err.payload().cloned(),
            ..Self::error(err.user_message())
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }

    /// Context for the `notification` template.
    pub fn to_context(&self) -> Value {
        json!({
            "level": self.level,
            "message": self.message,
            "raised_at": self.raised_at.to_rfc3339(),
        })
    }
}
