//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. Capacity denials are not errors; they
//! are ordinary values returned by the coordinator.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the bridge runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// Validation errors (invalid input from a caller).
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or malformed configuration.
    #[error("config error: {0}")]
    Config(String),

    /// An adapter could not be constructed (missing dependency, bad settings).
    #[error("adapter load error: {0}")]
    AdapterLoad(String),

    /// A collaborator (e.g. the resource coordinator) is not accepting work.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Internal invariant violations. Indicates a bug, never retried.
    #[error("internal error: {0}")]
    Internal(String),

    /// Timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// HTTP transport errors.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse errors.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map to a JSON-RPC 2.0 error code.
    pub fn to_rpc_error_code(&self) -> i64 {
        match self {
            Error::Validation(_) | Error::Serialization(_) => -32602,
            Error::NotFound(_) => -32601,
            Error::Config(_)
            | Error::AdapterLoad(_)
            | Error::Unavailable(_)
            | Error::Internal(_)
            | Error::Timeout(_)
            | Error::Http(_)
            | Error::Toml(_)
            | Error::Io(_) => -32603,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn adapter_load(msg: impl Into<String>) -> Self {
        Self::AdapterLoad(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }
}
