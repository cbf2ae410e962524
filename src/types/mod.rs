//! Core types for the bridge runtime.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (AgentId, InvocationId)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for server, coordination, and adapters

mod config;
mod errors;
mod ids;

pub use config::{
    AdapterConfig, Config, CoordinationConfig, CoordinationMode, ObservabilityConfig,
    RegistryConfig, ServerConfig,
};
pub use errors::{Error, Result};
pub use ids::{AgentId, InvocationId};
