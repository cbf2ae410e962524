//! Bridge adapter contract and the factory table that builds adapters.
//!
//! An adapter wraps one library or CLI tool. It either routes every operation
//! through a generic [`Dispatcher`], or publishes an [`OperationTable`] of
//! named operations with declared keyword parameters. Adapters are built by
//! name from [`AdapterFactories`] at first use; a factory that cannot build
//! its adapter (missing executable, bad settings) is the load failure the
//! registry caches.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::config::ToolConfig;
use super::params::{fill_defaults, input_schema, validate_params, ParamDef, Params};
use super::result::ToolResult;
use super::status::ToolStatus;
use crate::types::Result;

/// Interface every bridge adapter implements.
#[async_trait]
pub trait BridgeAdapter: Send + Sync {
    /// Operation names this adapter supports. Stable for the process lifetime.
    fn capabilities(&self) -> Vec<String>;

    /// Cheap, bounded liveness check. Never fails; problems are reported in the status.
    async fn status(&self) -> ToolStatus;

    /// How operations reach the adapter.
    fn dispatch(&self) -> Dispatch<'_>;
}

/// Dispatch strategy exposed by an adapter.
#[allow(missing_debug_implementations)]
pub enum Dispatch<'a> {
    /// Generic entry point; takes precedence when present.
    Dispatcher(&'a dyn Dispatcher),
    /// Named operations invoked with validated keyword params.
    Operations(&'a OperationTable),
}

/// Generic `execute(operation, params)` entry point.
///
/// Implementations return a structured failure for unknown operations and for
/// any library error; they never panic on bad input.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn execute(&self, operation: &str, params: Params) -> ToolResult;
}

type Handler = Arc<dyn Fn(Params) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// One named operation.
#[derive(Clone)]
pub struct Operation {
    name: String,
    description: String,
    parameters: Vec<ParamDef>,
    handler: Handler,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl Operation {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            handler: Arc::new(move |params: Params| -> BoxFuture<'static, ToolResult> {
                Box::pin(handler(params))
            }),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a keyword parameter.
    pub fn param(mut self, def: ParamDef) -> Self {
        self.parameters.push(def);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[ParamDef] {
        &self.parameters
    }

    pub fn input_schema(&self) -> serde_json::Value {
        input_schema(&self.parameters)
    }

    /// Validate `params`, fill defaults, and run the handler.
    pub async fn invoke(&self, mut params: Params) -> ToolResult {
        let errors = validate_params(&self.parameters, &params);
        if !errors.is_empty() {
            return ToolResult::failure(format!(
                "Invalid arguments for '{}': {}",
                self.name,
                errors.join("; ")
            ));
        }
        fill_defaults(&self.parameters, &mut params);
        (self.handler)(params).await
    }
}

/// Named operations, in registration order.
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    operations: Vec<Operation>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation, replacing one with the same name.
    pub fn register(mut self, operation: Operation) -> Self {
        self.operations.retain(|o| o.name != operation.name);
        self.operations.push(operation);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|o| o.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.operations.iter().map(|o| o.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Builds the adapter for one configured tool.
pub trait AdapterFactory: Send + Sync {
    fn create(&self, tool: &ToolConfig) -> Result<Arc<dyn BridgeAdapter>>;
}

impl<F> AdapterFactory for F
where
    F: Fn(&ToolConfig) -> Result<Arc<dyn BridgeAdapter>> + Send + Sync,
{
    fn create(&self, tool: &ToolConfig) -> Result<Arc<dyn BridgeAdapter>> {
        self(tool)
    }
}

/// Registration table: bridge module name → factory.
#[derive(Clone, Default)]
pub struct AdapterFactories {
    factories: HashMap<String, Arc<dyn AdapterFactory>>,
}

impl fmt::Debug for AdapterFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterFactories")
            .field("modules", &self.names())
            .finish()
    }
}

impl AdapterFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `module`, replacing any previous one.
    pub fn register(&mut self, module: impl Into<String>, factory: impl AdapterFactory + 'static) {
        self.factories.insert(module.into(), Arc::new(factory));
    }

    pub fn get(&self, module: &str) -> Option<Arc<dyn AdapterFactory>> {
        self.factories.get(module).cloned()
    }

    /// Registered module names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::params::ParamType;
    use serde_json::json;

    fn echo() -> Operation {
        Operation::new("echo", |params: Params| async move {
            ToolResult::ok().with("text", params["text"].clone())
        })
        .param(ParamDef::new("text", ParamType::String))
    }

    #[tokio::test]
    async fn test_operation_invoke_validates() {
        let op = echo();

        let ok = op.invoke(json!({"text": "hi"}).as_object().cloned().unwrap()).await;
        assert_eq!(ok.to_value(), json!({"success": true, "text": "hi"}));

        let bad = op.invoke(Params::new()).await;
        assert!(!bad.success);
        assert!(bad.error.unwrap().contains("Missing required parameter: text"));
    }

    #[test]
    fn test_operation_table_replaces_by_name() {
        let table = OperationTable::new()
            .register(echo())
            .register(echo().describe("second"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("echo").unwrap().description(), "second");
        assert!(table.get("shout").is_none());
    }

    #[test]
    fn test_factory_table_lookup() {
        let mut factories = AdapterFactories::new();
        factories.register("broken", |_tool: &ToolConfig| -> Result<Arc<dyn BridgeAdapter>> {
            Err(crate::types::Error::adapter_load("no module baz"))
        });

        assert_eq!(factories.names(), vec!["broken"]);
        let factory = factories.get("broken").unwrap();
        assert!(factory.create(&ToolConfig::new("bar", "broken")).is_err());
        assert!(factories.get("missing").is_none());
    }
}
