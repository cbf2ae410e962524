//! Static tool configuration.
//!
//! Tool definitions come from a TOML document of `[tools.<id>]` tables.
//! Document order is kept for listing. A malformed table is logged and
//! skipped so one bad entry does not take the rest of the registry down.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::types::Result;

/// One HTTP endpoint exposed by an `http` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Static configuration of one tool. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Registry key (the table name in the document).
    #[serde(default)]
    pub id: String,
    /// Display name; defaults to `id`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Checked for existence by `check_status`; empty means no check.
    #[serde(default)]
    pub path: String,
    /// Key into the adapter factory table.
    pub bridge_module: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Operation names the tool claims to support.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Executable for `command` tools, base URL for `http` tools.
    #[serde(default)]
    pub entry_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_requires: Option<String>,
    /// Diagnostic hint shown when the tool cannot load.
    #[serde(default)]
    pub install_cmd: String,
    #[serde(default)]
    pub requires_docker: bool,
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

impl ToolConfig {
    /// Minimal enabled config, mostly for tests and programmatic registries.
    pub fn new(id: impl Into<String>, bridge_module: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            path: String::new(),
            bridge_module: bridge_module.into(),
            enabled: true,
            capabilities: Vec::new(),
            entry_point: String::new(),
            python_requires: None,
            install_cmd: String::new(),
            requires_docker: false,
            endpoints: BTreeMap::new(),
        }
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    fn finish(mut self, id: String) -> Self {
        if self.name.is_empty() {
            self.name = id.clone();
        }
        self.id = id;
        let mut seen = std::collections::HashSet::new();
        self.capabilities.retain(|c| seen.insert(c.clone()));
        self
    }
}

#[derive(Debug, Deserialize)]
struct ToolsDocument {
    #[serde(default)]
    tools: toml::Table,
}

/// Parse a tool document. Fails only when the document itself is not valid TOML.
pub fn parse_tools(content: &str) -> Result<Vec<ToolConfig>> {
    let document: ToolsDocument = toml::from_str(content)?;
    let mut tools = Vec::with_capacity(document.tools.len());

    for (id, value) in document.tools {
        match value.try_into::<ToolConfig>() {
            Ok(config) => tools.push(config.finish(id)),
            Err(e) => {
                tracing::error!(tool = %id, error = %e, "Skipping malformed tool configuration");
            }
        }
    }

    Ok(tools)
}

/// Resolve relative tool paths against the directory holding the document.
pub fn resolve_paths(tools: &mut [ToolConfig], base: &Path) {
    for tool in tools {
        if tool.path.is_empty() || Path::new(&tool.path).is_absolute() {
            continue;
        }
        tool.path = base.join(&tool.path).to_string_lossy().into_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
        [tools.semgrep]
        name = "Semgrep"
        description = "Static analysis"
        path = "bridges/semgrep"
        bridge_module = "command"
        entry_point = "semgrep"
        capabilities = ["scan", "scan", "version"]
        install_cmd = "pip install semgrep"

        [tools.conscious]
        bridge_module = "http"
        entry_point = "http://127.0.0.1:8765"
        enabled = false
        capabilities = ["status", "speak"]

        [tools.conscious.endpoints.status]
        path = "/api/status"

        [tools.conscious.endpoints.speak]
        method = "POST"
        path = "/api/speak"
    "#;

    #[test]
    fn test_parse_keeps_document_order() {
        let tools = parse_tools(DOCUMENT).unwrap();
        let ids: Vec<&str> = tools.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["semgrep", "conscious"]);
    }

    #[test]
    fn test_parse_fields_and_defaults() {
        let tools = parse_tools(DOCUMENT).unwrap();
        let semgrep = &tools[0];
        assert_eq!(semgrep.name, "Semgrep");
        assert!(semgrep.enabled);
        assert_eq!(semgrep.capabilities, vec!["scan", "version"]);
        assert!(semgrep.has_capability("scan"));

        let conscious = &tools[1];
        assert_eq!(conscious.name, "conscious");
        assert!(!conscious.enabled);
        assert_eq!(conscious.endpoints["status"].method, "GET");
        assert_eq!(conscious.endpoints["speak"].method, "POST");
    }

    #[test]
    fn test_malformed_table_is_skipped() {
        let tools = parse_tools(
            r#"
            [tools.broken]
            name = "missing bridge module"

            [tools.ok]
            bridge_module = "command"
            "#,
        )
        .unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].id, "ok");
    }

    #[test]
    fn test_invalid_document_is_error() {
        assert!(parse_tools("[tools.x\nbridge_module =").is_err());
    }

    #[test]
    fn test_resolve_relative_paths() {
        let mut tools = parse_tools(DOCUMENT).unwrap();
        resolve_paths(&mut tools, Path::new("/opt/toolbridge"));
        assert_eq!(tools[0].path, "/opt/toolbridge/bridges/semgrep");
        assert_eq!(tools[1].path, "");
    }
}
