//! Error types shared by the wire protocol, the unix-socket client, and the
//! plugin runtime contract.
//!
//! Two error shapes exist here: [`PluginError`] is the in-process error a
//! plugin implementation or dispatcher raises, while [`ErrorEnvelope`] is its
//! wire-level projection — the only form that ever crosses the unix socket.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// In-process error raised by plugin bodies, the child dispatcher, or the
/// unix-socket client.
///
/// `code` is a short, stable machine-readable tag. `http_code` is carried
/// even on the child side because it is forwarded verbatim to the HTTP edge.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("{code}: {message}")]
    Known {
        code: String,
        message: String,
        data: Option<HashMap<String, serde_json::Value>>,
        http_code: u16,
    },

    #[error("plugin entry not found: {0}")]
    EntryNotFound(String),

    #[error("invalid action: {0}")]
    ActionNotFound(String),

    #[error("action is required")]
    ActionMissing,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("timeout waiting for child process")]
    Timeout,

    #[error("connection to child process refused")]
    ConnectionRefused,
}

impl PluginError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, http_code: u16) -> Self {
        PluginError::Known {
            code: code.into(),
            message: message.into(),
            data: None,
            http_code,
        }
    }

    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        if let PluginError::Known { data: d, .. } = &mut self {
            *d = Some(data);
        }
        self
    }

    /// The wire/HTTP status this error maps to.
    pub fn http_code(&self) -> u16 {
        match self {
            PluginError::Known { http_code, .. } => *http_code,
            PluginError::EntryNotFound(_) => 404,
            PluginError::ActionNotFound(_) | PluginError::ActionMissing => 400,
            PluginError::Timeout | PluginError::ConnectionRefused => 503,
            PluginError::Io(_) | PluginError::Serialization(_) => 500,
        }
    }

    /// The stable machine-readable code this error maps to, defaulting to
    /// the variant's own type name when no explicit code was given.
    pub fn code(&self) -> String {
        match self {
            PluginError::Known { code, .. } => code.clone(),
            PluginError::EntryNotFound(_) => "PluginEntryNotFound".to_string(),
            PluginError::ActionNotFound(_) => "ActionNotFound".to_string(),
            PluginError::ActionMissing => "InvalidRequest".to_string(),
            PluginError::Timeout => "Timeout".to_string(),
            PluginError::ConnectionRefused => "ConnectionRefused".to_string(),
            PluginError::Io(_) => "IoError".to_string(),
            PluginError::Serialization(_) => "SerializationError".to_string(),
        }
    }

    pub fn to_envelope(&self) -> ErrorEnvelope {
        let data = match self {
            PluginError::Known { data, .. } => data.clone(),
            _ => None,
        };
        ErrorEnvelope {
            code: self.code(),
            message: self.to_string(),
            data,
            http_code: self.http_code(),
        }
    }
}

/// The wire-level error shape, identical on both the child-dispatch boundary
/// and the HTTP-edge boundary — the only two points where an in-process
/// error is converted into this wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, serde_json::Value>>,
    pub http_code: u16,
}

impl From<ErrorEnvelope> for PluginError {
    fn from(e: ErrorEnvelope) -> Self {
        PluginError::Known {
            code: e.code,
            message: e.message,
            data: e.data,
            http_code: e.http_code,
        }
    }
}

impl From<&PluginError> for ErrorEnvelope {
    fn from(e: &PluginError) -> Self {
        e.to_envelope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_error_carries_its_own_code_and_status() {
        let err = PluginError::new("CustomThing", "bad input", 422);
        assert_eq!(err.code(), "CustomThing");
        assert_eq!(err.http_code(), 422);
    }

    #[test]
    fn unclassified_variants_fall_back_to_a_type_name_code() {
        let err = PluginError::EntryNotFound("missing".to_string());
        assert_eq!(err.code(), "PluginEntryNotFound");
        assert_eq!(err.http_code(), 404);

        let err = PluginError::ActionNotFound("bogus".to_string());
        assert_eq!(err.http_code(), 400);
    }

    #[test]
    fn envelope_round_trips_back_into_a_known_error() {
        let mut data = HashMap::new();
        data.insert("field".to_string(), serde_json::json!("bad"));
        let err = PluginError::new("X", "y", 418).with_data(data);

        let envelope = err.to_envelope();
        assert_eq!(envelope.data.as_ref().unwrap()["field"], serde_json::json!("bad"));

        let restored = PluginError::from(envelope);
        assert_eq!(restored.http_code(), 418);
        assert_eq!(restored.code(), "X");
    }
}
