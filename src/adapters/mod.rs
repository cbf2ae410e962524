//! Built-in bridge adapters.
//!
//! - `command`: CLI tools run as bounded subprocesses.
//! - `http`: REST services proxied endpoint by endpoint.
//!
//! Library-specific adapters register alongside these in the same
//! [`AdapterFactories`] table.

pub mod command;
pub mod http;

use std::sync::Arc;

pub use command::CommandAdapter;
pub use http::HttpAdapter;

use crate::tools::{AdapterFactories, BridgeAdapter, ToolConfig};
use crate::types::{AdapterConfig, Result};

/// Bridge module name served by [`CommandAdapter`].
pub const COMMAND_MODULE: &str = "command";
/// Bridge module name served by [`HttpAdapter`].
pub const HTTP_MODULE: &str = "http";

/// Factory table with the built-in adapters registered.
pub fn builtin_factories(settings: &AdapterConfig) -> AdapterFactories {
    let mut factories = AdapterFactories::new();

    let command_settings = settings.clone();
    factories.register(
        COMMAND_MODULE,
        move |tool: &ToolConfig| -> Result<Arc<dyn BridgeAdapter>> {
            Ok(Arc::new(CommandAdapter::from_config(tool, &command_settings)?))
        },
    );

    let http_settings = settings.clone();
    factories.register(
        HTTP_MODULE,
        move |tool: &ToolConfig| -> Result<Arc<dyn BridgeAdapter>> {
            Ok(Arc::new(HttpAdapter::from_config(tool, &http_settings)?))
        },
    );

    factories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_modules_registered() {
        let factories = builtin_factories(&AdapterConfig::default());
        assert_eq!(factories.names(), vec!["command", "http"]);
    }
}
