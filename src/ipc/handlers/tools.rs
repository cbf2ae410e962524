//! Tools handler: `tools/list` and `tools/call` over the registry.

use serde_json::{json, Value};

use crate::ipc::router::{object_field, str_field};
use crate::tools::{ToolConfig, ToolRegistry};
use crate::types::{Error, Result};

/// One descriptor per enabled tool, in configuration order.
pub fn list(registry: &ToolRegistry) -> Result<Value> {
    let tools: Vec<Value> = registry.list_tools(true).into_iter().map(descriptor).collect();
    Ok(json!({ "tools": tools }))
}

fn descriptor(tool: &ToolConfig) -> Value {
    let mut operation = json!({
        "type": "string",
        "description": "Operation to run",
    });
    if !tool.capabilities.is_empty() {
        operation["enum"] = json!(tool.capabilities);
    }

    let description = if tool.description.is_empty() {
        tool.name.clone()
    } else {
        tool.description.clone()
    };

    json!({
        "name": tool.id,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": {
                "operation": operation,
                "params": {
                    "type": "object",
                    "description": "Keyword parameters for the operation",
                },
            },
            "required": ["operation"],
        },
    })
}

/// Execute `{name, arguments: {operation, params}}`.
///
/// Tool-level failures are results with `isError: true`; only malformed
/// requests become JSON-RPC errors.
pub async fn call(registry: &ToolRegistry, params: &Value) -> Result<Value> {
    let name = str_field(params, "name")?;
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
    let operation = str_field(&arguments, "operation")
        .map_err(|_| Error::validation("Missing required field: arguments.operation"))?;
    let op_params = object_field(&arguments, "params")?;

    tracing::debug!(tool = %name, operation = %operation, "Dispatching tool call");

    let result = registry.execute(&name, &operation, op_params).await;
    let text = serde_json::to_string(&result)?;

    Ok(json!({
        "content": [{ "type": "text", "text": text }],
        "isError": !result.success,
    }))
}
