//! Top-level router: JSON-RPC method → handler.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::ipc::handlers;
use crate::ipc::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::tools::ToolRegistry;
use crate::types::{Error, Result};

/// Shared request handler. Cheap to clone into per-call tasks.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<ToolRegistry>,
}

impl Router {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one request. Notifications yield `None`.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let result = route_request(&self.registry, &request.method, request.params).await;

        let Some(id) = request.id else {
            if let Err(e) = result {
                tracing::warn!(method = %request.method, error = %e, "Notification handling failed");
            }
            return None;
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, e.into()),
        })
    }
}

/// Route a method call to its handler.
pub async fn route_request(registry: &ToolRegistry, method: &str, params: Value) -> Result<Value> {
    match method {
        "initialize" => handlers::session::initialize(&params),
        "initialized" | "notifications/initialized" => Ok(Value::Object(Map::new())),
        "ping" => Ok(Value::Object(Map::new())),
        "tools/list" => handlers::tools::list(registry),
        "tools/call" => handlers::tools::call(registry, &params).await,
        "coordinator/status" => handlers::status::coordinator(registry),
        "registry/status" => handlers::status::registry(registry, &params).await,
        _ => Err(Error::not_found(format!("Unknown method: {}", method))),
    }
}

// =============================================================================
// Shared helpers — used by all handler modules
// =============================================================================

pub fn str_field(body: &Value, key: &str) -> Result<String> {
    body.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::validation(format!("Missing required field: {}", key)))
}

/// Optional object field; absent or `null` yields an empty map.
pub fn object_field(body: &Value, key: &str) -> Result<Map<String, Value>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(Error::validation(format!("Field '{}' must be an object", key))),
    }
}
