//! Tool registry — configuration, lazy adapter binding, routing.
//!
//! Each configured tool moves through `unresolved → loaded | failed` exactly
//! once. A failed load is cached with its reason and never retried within
//! this registry's lifetime. `execute` never returns an error value or lets
//! a panic escape: every failure becomes a `ToolResult` with `success: false`.

use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use super::adapter::{AdapterFactories, BridgeAdapter, Dispatch};
use super::config::{parse_tools, resolve_paths, ToolConfig};
use super::params::Params;
use super::result::ToolResult;
use super::status::ToolStatus;
use crate::coordinator::{Admission, AllocationGuard, ResourceCoordinator};
use crate::types::{AgentId, CoordinationMode, InvocationId};

/// Cached outcome of building a tool's adapter.
#[derive(Clone)]
enum LoadState {
    Loaded(Arc<dyn BridgeAdapter>),
    Failed(String),
}

/// Public view of a tool's load state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterState {
    Unresolved,
    Loaded,
    Failed(String),
}

/// Registry of configured tools and their lazily-built adapters.
pub struct ToolRegistry {
    tools: Vec<ToolConfig>,
    index: HashMap<String, usize>,
    factories: AdapterFactories,
    /// One cell per tool. The mutex covers only the map lookup; the factory
    /// runs inside the tool's own cell.
    cache: Mutex<HashMap<String, Arc<OnceLock<LoadState>>>>,
    coordinator: Option<ResourceCoordinator>,
    mode: CoordinationMode,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.index.len())
            .field("factories", &self.factories)
            .field("coordinated", &self.coordinator.is_some())
            .field("mode", &self.mode)
            .finish()
    }
}

impl ToolRegistry {
    /// Empty registry using `factories` to build adapters.
    pub fn new(factories: AdapterFactories) -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            factories,
            cache: Mutex::new(HashMap::new()),
            coordinator: None,
            mode: CoordinationMode::default(),
        }
    }

    /// Registry over an explicit tool list.
    pub fn from_tools(factories: AdapterFactories, tools: Vec<ToolConfig>) -> Self {
        let mut registry = Self::new(factories);
        registry.set_tools(tools);
        registry
    }

    pub fn with_coordinator(mut self, coordinator: ResourceCoordinator) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn with_mode(mut self, mode: CoordinationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn coordinator(&self) -> Option<&ResourceCoordinator> {
        self.coordinator.as_ref()
    }

    pub fn mode(&self) -> CoordinationMode {
        self.mode
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Load tool definitions from a TOML file.
    ///
    /// A missing or unparsable file is logged and leaves the registry empty.
    /// Relative tool paths resolve against the file's directory.
    pub fn load_config(&mut self, source: &Path) {
        let content = match std::fs::read_to_string(source) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(
                    path = %source.display(),
                    error = %e,
                    "Tool configuration unreadable; registry has no tools"
                );
                self.set_tools(Vec::new());
                return;
            }
        };

        self.load_config_str(&content);
        if let Some(base) = source.parent() {
            resolve_paths(&mut self.tools, base);
        }
        tracing::info!(path = %source.display(), tools = self.tools.len(), "Tool configuration loaded");
    }

    /// Load tool definitions from an in-memory TOML document.
    pub fn load_config_str(&mut self, content: &str) {
        match parse_tools(content) {
            Ok(tools) => self.set_tools(tools),
            Err(e) => {
                tracing::error!(error = %e, "Tool configuration unparsable; registry has no tools");
                self.set_tools(Vec::new());
            }
        }
    }

    fn set_tools(&mut self, tools: Vec<ToolConfig>) {
        self.tools.clear();
        self.index.clear();
        for tool in tools {
            if self.index.contains_key(&tool.id) {
                tracing::warn!(tool = %tool.id, "Duplicate tool id ignored");
                continue;
            }
            self.index.insert(tool.id.clone(), self.tools.len());
            self.tools.push(tool);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, name: &str) -> Option<&ToolConfig> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Tools in configuration order.
    pub fn list_tools(&self, enabled_only: bool) -> Vec<&ToolConfig> {
        self.tools
            .iter()
            .filter(|t| !enabled_only || t.enabled)
            .collect()
    }

    /// Enabled tools declaring `capability`.
    pub fn find_tools_for_capability(&self, capability: &str) -> Vec<&ToolConfig> {
        self.tools
            .iter()
            .filter(|t| t.enabled && t.has_capability(capability))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn adapter_state(&self, name: &str) -> AdapterState {
        let cell = self.cache.lock().get(name).cloned();
        match cell.as_deref().and_then(OnceLock::get) {
            None => AdapterState::Unresolved,
            Some(LoadState::Loaded(_)) => AdapterState::Loaded,
            Some(LoadState::Failed(reason)) => AdapterState::Failed(reason.clone()),
        }
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Status of one tool: configuration checks first, then the adapter's own report.
    pub async fn check_status(&self, name: &str) -> ToolStatus {
        let Some(config) = self.get(name) else {
            return ToolStatus::unavailable(name, format!("Tool '{}' not found", name));
        };
        if !config.enabled {
            return ToolStatus::unavailable(name, format!("Tool '{}' is disabled", name));
        }
        if !config.path.is_empty() && !Path::new(&config.path).exists() {
            return ToolStatus::unavailable(name, format!("Path not found: {}", config.path));
        }

        let adapter = match self.load_adapter(config) {
            Ok(adapter) => adapter,
            Err(reason) => return ToolStatus::unavailable(name, reason),
        };

        match AssertUnwindSafe(adapter.status()).catch_unwind().await {
            Ok(status) => ToolStatus {
                name: name.to_string(),
                ..status
            }
            .normalized(),
            Err(_) => {
                tracing::error!(tool = name, "Adapter panicked during status check");
                ToolStatus::unhealthy(name, "status check panicked")
            }
        }
    }

    /// Status of every enabled tool, probed concurrently.
    pub async fn status_all(&self) -> Vec<ToolStatus> {
        let names: Vec<&str> = self
            .tools
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.id.as_str())
            .collect();
        futures::future::join_all(names.into_iter().map(|n| self.check_status(n))).await
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run `operation` on `tool_name` under resource coordination.
    pub async fn execute(&self, tool_name: &str, operation: &str, params: Params) -> ToolResult {
        let Some(config) = self.get(tool_name) else {
            return ToolResult::failure(format!("Tool '{}' not found", tool_name));
        };
        if !config.enabled {
            return ToolResult::failure(format!("Tool '{}' is disabled", tool_name));
        }

        let adapter = match self.load_adapter(config) {
            Ok(adapter) => adapter,
            Err(reason) => {
                return ToolResult::failure(format!("Failed to load tool '{}': {}", tool_name, reason))
            }
        };

        let guard = match self.coordinate(tool_name, operation) {
            Ok(guard) => guard,
            Err(denied) => return denied,
        };

        let started = Instant::now();
        let outcome = AssertUnwindSafe(route(adapter.as_ref(), tool_name, operation, params))
            .catch_unwind()
            .await;
        drop(guard);

        let result = outcome.unwrap_or_else(|_| {
            tracing::error!(tool = tool_name, operation, "Adapter panicked during execution");
            ToolResult::failure(format!(
                "Tool '{}' panicked while running '{}'",
                tool_name, operation
            ))
        });

        let latency_ms = started.elapsed().as_millis() as u64;
        if result.success {
            tracing::info!(tool = tool_name, operation, latency_ms, "Tool execution succeeded");
        } else {
            tracing::warn!(
                tool = tool_name,
                operation,
                latency_ms,
                error = result.error.as_deref().unwrap_or(""),
                "Tool execution failed"
            );
        }
        result
    }

    /// Reserve budget for one execution.
    ///
    /// `Ok(None)` means proceeding uncoordinated (best-effort mode with no
    /// reachable coordinator). `Err` carries the failure to return.
    fn coordinate(
        &self,
        tool_name: &str,
        operation: &str,
    ) -> std::result::Result<Option<AllocationGuard>, ToolResult> {
        let unavailable = |detail: String| {
            if self.mode == CoordinationMode::Strict {
                tracing::error!(tool = tool_name, operation, detail = %detail, "Coordination required but unavailable");
                return Err(ToolResult::failure(format!(
                    "Resource coordinator unavailable: {}",
                    detail
                )));
            }
            tracing::warn!(
                tool = tool_name,
                operation,
                detail = %detail,
                "Resource coordinator unavailable; executing uncoordinated"
            );
            Ok(None)
        };

        let Some(coordinator) = &self.coordinator else {
            return unavailable("no coordinator configured".to_string());
        };

        let agent_id = AgentId::for_invocation(tool_name, operation, &InvocationId::new());
        match coordinator.acquire(agent_id.as_str(), operation) {
            Ok(Admission::Granted(guard)) => Ok(Some(guard)),
            Ok(Admission::Denied(denied)) => {
                let reason = denied.reason.map(|r| r.to_string()).unwrap_or_default();
                Err(ToolResult::failure(format!("Resource allocation denied: {}", reason))
                    .with("reason", reason)
                    .with("pool_remaining", denied.pool_remaining))
            }
            Err(e) => unavailable(e.to_string()),
        }
    }

    fn load_adapter(&self, config: &ToolConfig) -> std::result::Result<Arc<dyn BridgeAdapter>, String> {
        let cell = self
            .cache
            .lock()
            .entry(config.id.clone())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone();

        match cell.get_or_init(|| self.build_adapter(config)) {
            LoadState::Loaded(adapter) => Ok(adapter.clone()),
            LoadState::Failed(reason) => Err(reason.clone()),
        }
    }

    fn build_adapter(&self, config: &ToolConfig) -> LoadState {
        let state = match self.factories.get(&config.bridge_module) {
            None => LoadState::Failed(format!(
                "No adapter registered for bridge module '{}'",
                config.bridge_module
            )),
            Some(factory) => match std::panic::catch_unwind(AssertUnwindSafe(|| factory.create(config))) {
                Ok(Ok(adapter)) => LoadState::Loaded(adapter),
                Ok(Err(e)) => LoadState::Failed(e.to_string()),
                Err(_) => LoadState::Failed("adapter constructor panicked".to_string()),
            },
        };

        match &state {
            LoadState::Loaded(_) => {
                tracing::info!(tool = %config.id, module = %config.bridge_module, "Adapter loaded");
            }
            LoadState::Failed(reason) => {
                tracing::warn!(
                    tool = %config.id,
                    module = %config.bridge_module,
                    reason = %reason,
                    install_cmd = %config.install_cmd,
                    "Adapter failed to load"
                );
            }
        }
        state
    }
}

/// Generic dispatcher first; otherwise the named operation table.
async fn route(
    adapter: &dyn BridgeAdapter,
    tool_name: &str,
    operation: &str,
    params: Params,
) -> ToolResult {
    match adapter.dispatch() {
        Dispatch::Dispatcher(dispatcher) => dispatcher.execute(operation, params).await,
        Dispatch::Operations(table) => match table.get(operation) {
            Some(op) => op.invoke(params).await,
            None => ToolResult::failure(format!(
                "Unknown operation '{}' for tool '{}'",
                operation, tool_name
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::adapter::{Operation, OperationTable};
    use crate::types::{Error, Result};
    use async_trait::async_trait;
    use tracing_test::traced_test;

    struct Noop {
        ops: OperationTable,
    }

    #[async_trait]
    impl BridgeAdapter for Noop {
        fn capabilities(&self) -> Vec<String> {
            self.ops.names()
        }

        async fn status(&self) -> ToolStatus {
            ToolStatus::healthy("noop")
        }

        fn dispatch(&self) -> Dispatch<'_> {
            Dispatch::Operations(&self.ops)
        }
    }

    fn registry() -> ToolRegistry {
        let mut factories = AdapterFactories::new();
        factories.register("noop", |_tool: &ToolConfig| -> Result<Arc<dyn BridgeAdapter>> {
            let ops = OperationTable::new()
                .register(Operation::new("run", |_params: Params| async { ToolResult::ok() }));
            Ok(Arc::new(Noop { ops }))
        });
        factories.register("missing", |_tool: &ToolConfig| -> Result<Arc<dyn BridgeAdapter>> {
            Err(Error::adapter_load("no module baz"))
        });

        factories.register("explodes", |_tool: &ToolConfig| -> Result<Arc<dyn BridgeAdapter>> {
            panic!("constructor bug")
        });

        let mut broken = ToolConfig::new("broken", "missing");
        broken.install_cmd = "pip install baz".to_string();
        ToolRegistry::from_tools(
            factories,
            vec![
                ToolConfig::new("noop", "noop"),
                broken,
                ToolConfig::new("boom", "explodes"),
            ],
        )
    }

    #[tokio::test]
    #[traced_test]
    async fn test_best_effort_logs_uncoordinated_execution() {
        let result = registry().execute("noop", "run", Params::new()).await;
        assert!(result.success);
        assert!(logs_contain("executing uncoordinated"));
        assert!(logs_contain("no coordinator configured"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_strict_logs_refusal() {
        let registry = registry().with_mode(CoordinationMode::Strict);
        let result = registry.execute("noop", "run", Params::new()).await;
        assert!(!result.success);
        assert!(logs_contain("Coordination required but unavailable"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_load_failure_logged_once_with_install_hint() {
        let registry = registry();
        registry.check_status("broken").await;
        registry.check_status("broken").await;

        assert!(logs_contain("Adapter failed to load"));
        assert!(logs_contain("pip install baz"));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("Adapter failed to load")).count() {
                1 => Ok(()),
                n => Err(format!("expected one load failure log, saw {}", n)),
            }
        });
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut second = ToolConfig::new("noop", "missing");
        second.description = "shadow".to_string();
        let registry = ToolRegistry::from_tools(
            AdapterFactories::new(),
            vec![ToolConfig::new("noop", "noop"), second],
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("noop").map(|t| t.bridge_module.as_str()), Some("noop"));
    }

    #[test]
    fn test_load_config_keeps_adapter_cache() {
        let mut registry = registry();
        futures::executor::block_on(registry.check_status("broken"));
        registry.load_config_str("[tools.broken]\nbridge_module = \"noop\"\n");

        assert_eq!(
            registry.adapter_state("broken"),
            AdapterState::Failed("adapter load error: no module baz".to_string())
        );
    }

    #[tokio::test]
    async fn test_constructor_panic_is_cached_failure() {
        let registry = registry();
        let result = registry.execute("boom", "run", Params::new()).await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Failed to load tool 'boom': adapter constructor panicked")
        );
        assert_eq!(
            registry.adapter_state("boom"),
            AdapterState::Failed("adapter constructor panicked".to_string())
        );

        let status = registry.check_status("boom").await;
        assert!(!status.available);
    }

    #[test]
    fn test_concurrent_loads_build_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let mut factories = AdapterFactories::new();
        factories.register("slow", move |_tool: &ToolConfig| -> Result<Arc<dyn BridgeAdapter>> {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            Ok(Arc::new(Noop { ops: OperationTable::new() }))
        });
        let registry = ToolRegistry::from_tools(
            factories,
            vec![ToolConfig::new("slow", "slow"), ToolConfig::new("noop", "missing")],
        );

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| futures::executor::block_on(registry.check_status("slow")));
            }
            // Other tools are not held up by a load in progress.
            scope.spawn(|| {
                let started = std::time::Instant::now();
                assert_eq!(registry.adapter_state("noop"), AdapterState::Unresolved);
                assert!(started.elapsed() < std::time::Duration::from_millis(50));
            });
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(registry.adapter_state("slow"), AdapterState::Loaded);
    }
}
