//! toolbridge stdio server - main entry point.
//!
//! Loads process and tool configuration, builds the registry with the
//! built-in adapters and a shared resource coordinator, then serves
//! JSON-RPC on stdin/stdout until EOF or Ctrl-C.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use toolbridge::adapters::builtin_factories;
use toolbridge::coordinator::ResourceCoordinator;
use toolbridge::ipc::BridgeServer;
use toolbridge::tools::ToolRegistry;
use toolbridge::types::CoordinationMode;
use toolbridge::Config;

#[derive(Debug, Parser)]
#[command(name = "toolbridge", version, about = "Stdio JSON-RPC bridge for library-backed tools")]
struct Args {
    /// Process configuration (TOML). Defaults apply when omitted.
    #[arg(short, long, env = "TOOLBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Tool definitions; overrides `registry.tools_path`.
    #[arg(short, long, env = "TOOLBRIDGE_TOOLS")]
    tools: Option<PathBuf>,

    /// Refuse to execute tools when the coordinator is unavailable.
    #[arg(long)]
    strict: bool,

    /// Run without a resource coordinator.
    #[arg(long)]
    no_coordinator: bool,

    /// Emit JSON logs on stderr.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(tools) = args.tools {
        config.registry.tools_path = tools;
    }
    if args.strict {
        config.coordination.mode = CoordinationMode::Strict;
    }
    if args.json_logs {
        config.observability.json_logs = true;
    }

    // Initialize observability
    toolbridge::observability::init_tracing(&config.observability);

    let mut registry = ToolRegistry::new(builtin_factories(&config.adapters))
        .with_mode(config.coordination.mode);
    if !args.no_coordinator {
        registry = registry.with_coordinator(ResourceCoordinator::new(config.coordination.clone()));
    }
    registry.load_config(&config.registry.tools_path);

    tracing::info!(
        tools = registry.len(),
        mode = ?config.coordination.mode,
        coordinated = registry.coordinator().is_some(),
        "toolbridge starting"
    );

    let registry = Arc::new(registry);
    let server = BridgeServer::new(registry.clone(), config.server.clone());

    let cancel = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received");
            cancel.cancel();
        }
    });

    server.serve_stdio().await?;

    if let Some(coordinator) = registry.coordinator() {
        coordinator.close();
        let pool = coordinator.status();
        tracing::info!(active_tasks = pool.active_tasks, used_tokens = pool.used_tokens, "Coordinator closed");
    }
    Ok(())
}
