//! Uniform response envelope
//!
//! Every operation exposed to the UI answers `{success, message?, ...}`.
//! Failures are values, never transport errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Successful envelope without message
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            payload: Map::new(),
        }
    }

    /// Successful envelope with a message
    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    /// Failed envelope
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            payload: Map::new(),
        }
    }

    /// Add a payload field
    pub fn with(mut self, field: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            warn!("Cannot serialize field {}: {}", field, e);
            Value::Null
        });
        self.payload.insert(field.to_string(), value);
        self
    }

    /// Read a payload field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }
}
