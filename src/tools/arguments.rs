//! Typed access to decoded tool call arguments.

use crate::error::SwitchboardError;

/// Wrapper around a decoded arguments object providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Decode the raw JSON text a model produced.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(serde_json::json!({})));
        }
        serde_json::from_str(trimmed).map(Self::new)
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, SwitchboardError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SwitchboardError::InvalidArgument(format!("Missing string argument: {key}"))
            })
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an optional unsigned integer argument.
    pub fn get_u64_opt(&self, key: &str) -> Option<u64> {
        self.value.get(key).and_then(|v| v.as_u64())
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, SwitchboardError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            SwitchboardError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}
