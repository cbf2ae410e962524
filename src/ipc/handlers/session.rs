//! Session handshake.

use serde_json::Value;

use crate::types::Result;

/// Protocol revision advertised when the client does not request one.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub fn initialize(params: &Value) -> Result<Value> {
    let version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
    let client = params
        .pointer("/clientInfo/name")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    tracing::info!(client, protocol_version = version, "Bridge session initialized");

    Ok(serde_json::json!({
        "protocolVersion": version,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_echoes_requested_version() {
        let result = initialize(&json!({"protocolVersion": "2025-03-26"})).unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "toolbridge");

        let result = initialize(&Value::Null).unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }
}
