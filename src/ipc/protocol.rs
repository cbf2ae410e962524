//! JSON-RPC 2.0 message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Error;

pub const JSONRPC_VERSION: &str = "2.0";

/// Incoming request or notification.
///
/// A message without an `id` (or with `id: null`) is a notification and gets
/// no response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Decode one line. Failures come back as the response to send.
    pub fn parse(line: &str) -> std::result::Result<Self, JsonRpcResponse> {
        let value: Value = serde_json::from_str(line).map_err(|e| {
            JsonRpcResponse::error(Value::Null, JsonRpcError::new(JsonRpcError::PARSE_ERROR, e.to_string()))
        })?;

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let version = value.get("jsonrpc").and_then(Value::as_str);
        if version != Some(JSONRPC_VERSION) {
            return Err(JsonRpcResponse::error(
                id,
                JsonRpcError::with_data(
                    JsonRpcError::INVALID_REQUEST,
                    "Invalid JSON-RPC version",
                    serde_json::json!({"expected": JSONRPC_VERSION, "got": version}),
                ),
            ));
        }

        serde_json::from_value(value).map_err(|e| {
            JsonRpcResponse::error(
                id,
                JsonRpcError::new(JsonRpcError::INVALID_REQUEST, format!("Invalid request: {}", e)),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i64, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl From<Error> for JsonRpcError {
    fn from(err: Error) -> Self {
        Self::new(err.to_rpc_error_code(), err.to_string())
    }
}
