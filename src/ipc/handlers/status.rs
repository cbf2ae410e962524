//! Status handlers: pool snapshot and tool health.

use serde_json::{json, Value};

use crate::tools::ToolRegistry;
use crate::types::Result;

pub fn coordinator(registry: &ToolRegistry) -> Result<Value> {
    let Some(coordinator) = registry.coordinator() else {
        return Ok(json!({ "available": false, "mode": registry.mode() }));
    };

    Ok(json!({
        "available": !coordinator.is_closed(),
        "mode": registry.mode(),
        "pool": coordinator.status(),
    }))
}

/// Health of one tool when `name` is given, otherwise of every enabled tool.
pub async fn registry(registry: &ToolRegistry, params: &Value) -> Result<Value> {
    if let Some(name) = params.get("name").and_then(Value::as_str) {
        let status = registry.check_status(name).await;
        return Ok(serde_json::to_value(status)?);
    }

    let statuses = registry.status_all().await;
    Ok(json!({
        "count": statuses.len(),
        "tools": statuses,
    }))
}
