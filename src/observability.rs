//! Observability utilities.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::types::ObservabilityConfig;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Initialize tracing subscriber once for the process.
///
/// Output always goes to stderr: stdout carries the JSON-RPC stream. Log
/// format defaults to compact text and switches to JSON when
/// `TOOLBRIDGE_LOG_FORMAT=json` or `json_logs` is set. `RUST_LOG` overrides
/// the configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let json = std::env::var("TOOLBRIDGE_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(config.json_logs);

        let result = if json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::init_tracing;
    use crate::types::ObservabilityConfig;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing(&ObservabilityConfig::default());
        init_tracing(&ObservabilityConfig::default());
    }
}
