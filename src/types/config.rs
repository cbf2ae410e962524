//! Configuration structures.
//!
//! Configuration is loaded from an optional TOML file; every section falls
//! back to its defaults when omitted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::errors::{Error, Result};

/// Global process configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Stdio server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Resource coordination limits.
    #[serde(default)]
    pub coordination: CoordinationConfig,

    /// Tool registry configuration.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Built-in adapter settings.
    #[serde(default)]
    pub adapters: AdapterConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Stdio server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Maximum accepted size of one JSON-RPC line in bytes.
    pub max_message_bytes: usize,

    /// Maximum tool calls handled concurrently. Further calls wait for a slot.
    pub max_in_flight: usize,

    /// Write timeout in seconds per response line.
    pub write_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: 5 * 1024 * 1024,
            max_in_flight: 64,
            write_timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// What the registry does when the coordinator cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationMode {
    /// Refuse to execute without an allocation.
    Strict,
    /// Log a warning and execute uncoordinated.
    #[default]
    BestEffort,
}

/// Resource pool limits and default budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Total token budget shared by all in-flight executions.
    pub max_tokens: u64,

    /// Maximum simultaneous allocations.
    pub max_concurrent: usize,

    /// Budget reserved by `acquire` for operations without an explicit entry.
    pub default_budget: u64,

    /// Per-operation budgets used by `acquire`.
    pub operation_budgets: HashMap<String, u64>,

    /// Behaviour when coordination is unavailable.
    pub mode: CoordinationMode,
}

impl CoordinationConfig {
    /// Budget `acquire` reserves for `operation`.
    pub fn budget_for(&self, operation: &str) -> u64 {
        self.operation_budgets
            .get(operation)
            .copied()
            .unwrap_or(self.default_budget)
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 100_000,
            max_concurrent: 5,
            default_budget: 1_000,
            operation_budgets: HashMap::new(),
            mode: CoordinationMode::BestEffort,
        }
    }
}

/// Tool registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Path to the TOML tool configuration document.
    pub tools_path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tools_path: PathBuf::from("tools.toml"),
        }
    }
}

/// Settings shared by the built-in adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Default wait for a command-backed operation before the child is killed.
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Upper bound for adapter `status()` probes.
    #[serde(with = "humantime_serde")]
    pub status_timeout: Duration,

    /// Request timeout for HTTP-backed operations.
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,

    /// Per-stream cap on captured command output in bytes.
    pub max_output_bytes: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(300),
            status_timeout: Duration::from_secs(5),
            http_timeout: Duration::from_secs(30),
            max_output_bytes: 5 * 1024 * 1024,
        }
    }
}
