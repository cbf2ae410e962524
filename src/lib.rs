//! # toolbridge - Tool registry and resource coordination for stdio bridges
//!
//! Exposes third-party libraries and CLI tools as tool-calling endpoints:
//! - Resource coordinator: process-wide token budget plus concurrency slots
//! - Tool registry: lazy adapter binding, health checks, routing
//! - Bridge adapter contract with built-in command and HTTP adapters
//! - Line-framed JSON-RPC 2.0 server on stdio
//!
//! ## Architecture
//!
//! ```text
//!   stdin ─→ BridgeServer ─→ Router ─→ ToolRegistry ─→ BridgeAdapter
//!   stdout ←──── writer ←────┘              │
//!                                  ResourceCoordinator
//!                                  (AllocationGuard per call)
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod adapters;
pub mod coordinator;
pub mod ipc;
pub mod tools;
pub mod types;

// Internal utilities
pub mod observability;

pub use types::{Config, Error, Result};
