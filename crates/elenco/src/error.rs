//! Error types shared by sets, views and transports.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::resource::{ClientId, ResourceId};

/// Field-scoped validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`. The first message for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Failure talking to the REST endpoint.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(String),

    /// Non-2xx response. `body` is the server payload, untouched.
    #[error("server responded with status {status}")]
    Status { status: u16, body: Value },

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// Human-readable message for inline notifications.
    ///
    /// Prefers an `error`, `detail` or `message` string from the server payload.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Status { body, status } => ["error", "detail", "message"]
                .iter()
                .find_map(|key| body.get(key).and_then(Value::as_str))
                .map(str::to_string)
                .or_else(|| body.as_str().filter(|s| !s.is_empty()).map(str::to_string))
                .unwrap_or_else(|| format!("The server responded with status {status}.")),
            TransportError::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            TransportError::Decode(_) => "The server sent a response we could not read.".to_string(),
        }
    }

    /// The server payload, if any.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            TransportError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ElencoError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("failed to load {endpoint}: {source}")]
    Fetch {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to save resource: {0}")]
    Save(#[source] TransportError),

    #[error("failed to delete resource {id}: {source}")]
    Delete {
        id: ResourceId,
        #[source]
        source: TransportError,
    },

    #[error("resource {0} is not in this set")]
    UnknownResource(ClientId),

    #[error("an unsaved {0} is already being added")]
    AddInProgress(String),

    #[error("template not registered: {0}")]
    MissingTemplate(String),
}

impl ElencoError {
    /// The transport failure behind a fetch, save or delete error.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            ElencoError::Fetch { source, .. } | ElencoError::Delete { source, .. } => Some(source),
            ElencoError::Save(source) => Some(source),
            _ => None,
        }
    }

    /// Network failures as `Ok`; anything else is handed back as the error.
    pub fn into_transport(self) -> Result<TransportError, ElencoError> {
        match self {
            ElencoError::Fetch { source, .. }
            | ElencoError::Save(source)
            | ElencoError::Delete { source, .. } => Ok(source),
            other => Err(other),
        }
    }
}

pub type ElencoResult<T> = Result<T, ElencoError>;
