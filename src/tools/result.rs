//! Structured operation results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mapping returned by every operation: `success`, optional `error`, and any
/// adapter-specific fields alongside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ToolResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: Map::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: Map::new(),
        }
    }

    /// Attach a field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Interpret a raw JSON mapping produced by a wrapped library.
    ///
    /// Anything that is not an object carrying a boolean `success` becomes a failure.
    pub fn from_value(value: Value) -> Self {
        let has_success = value.get("success").map_or(false, Value::is_boolean);
        if !has_success {
            return Self::failure("Malformed result: missing boolean 'success'");
        }
        serde_json::from_value(value)
            .unwrap_or_else(|e| Self::failure(format!("Malformed result: {}", e)))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({"success": false, "error": format!("Unserializable result: {}", e)})
        })
    }
}
