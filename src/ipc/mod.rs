//! Stdio JSON-RPC transport layer.
//!
//! Newline-delimited JSON-RPC 2.0 on stdin/stdout, exposing the tool
//! registry as `tools/list` and `tools/call`. Logs never go to stdout.

pub mod codec;
pub mod handlers;
pub mod protocol;
pub mod router;
pub mod server;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use router::Router;
pub use server::BridgeServer;
