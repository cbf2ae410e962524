//! Tool infrastructure — configuration, adapter contract, registry.
//!
//! The registry owns tool *configuration* and a cache of built adapters.
//! Adapters own the library-specific work and report every failure as a
//! structured [`ToolResult`].

pub mod adapter;
pub mod config;
pub mod params;
pub mod registry;
pub mod result;
pub mod status;

pub use adapter::{
    AdapterFactories, AdapterFactory, BridgeAdapter, Dispatch, Dispatcher, Operation,
    OperationTable,
};
pub use config::{EndpointConfig, ToolConfig};
pub use params::{ParamDef, ParamType, Params};
pub use registry::{AdapterState, ToolRegistry};
pub use result::ToolResult;
pub use status::ToolStatus;
