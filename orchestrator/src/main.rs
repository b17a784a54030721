//! Main entry point for the orchestrator binary
//!
//! Brings the stack up with the real services, prints where it is listening,
//! and keeps it running until Ctrl+C.

use clap::Parser;
use std::path::PathBuf;
use tokio::signal;

use orchestrator::{OrchestratorError, OrchestratorResult, RealStackOrchestrator, StackConfig};
use shared::{logging, process_debug, ProcessId};

/// Start and supervise a local coordinator, model workers and API gateway
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Starts a local LLM inference stack and keeps it running until Ctrl+C")]
pub struct Args {
    /// Model path or hub id served by the workers
    #[arg(long, default_value = "lmsys/vicuna-7b-v1.5")]
    pub model: String,

    /// Number of model workers to start
    #[arg(long, default_value = "1")]
    pub workers: u32,

    /// Host every role binds to and is probed on
    #[arg(long)]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Skip the sweep of stale stack processes before startup
    #[arg(long)]
    pub no_cleanup: bool,

    /// JSON configuration file; environment and flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Defaults, then the config file, then `STACK_*` variables, then flags
fn build_config(args: &Args) -> OrchestratorResult<StackConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let _ = dotenv::dotenv();
            let mut config = StackConfig::from_file(path)?;
            config.apply_env()?;
            config
        }
        None => StackConfig::from_env()?,
    };

    if let Some(host) = &args.host {
        config = config.with_host(host.clone());
    }
    if args.no_cleanup {
        config = config.without_cleanup();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> OrchestratorResult<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize process ID singleton for orchestrator
    ProcessId::init_orchestrator();
    logging::init_tracing(Some(&args.log_level));

    if args.workers == 0 {
        return Err(OrchestratorError::config("--workers must be at least 1"));
    }

    let config = build_config(&args)?;
    process_debug!(ProcessId::current(), "Configuration: {:?}", config);
    logging::log_startup(
        ProcessId::current(),
        &format!("stack for model '{}' with {} worker(s)", args.model, args.workers),
    );

    let mut orchestrator = RealStackOrchestrator::from_config(config)?;

    let ports = match orchestrator.start_full_stack(&args.model).await {
        Ok(ports) => ports,
        Err(e) => {
            logging::log_error(ProcessId::current(), "Stack startup", &e);
            return Err(e);
        }
    };

    for _ in 1..args.workers {
        if let Err(e) = orchestrator.start_worker(&args.model).await {
            logging::log_error(ProcessId::current(), "Additional worker startup", &e);
            orchestrator.stop_all_servers().await;
            return Err(e);
        }
    }

    let summary = serde_json::json!({
        "ports": ports,
        "workers": orchestrator
            .processes()
            .iter()
            .filter(|p| p.role.is_worker())
            .map(|p| p.port)
            .collect::<Vec<_>>(),
        "gateway_base_url": orchestrator.gateway_base_url(),
        "warnings": orchestrator
            .warnings()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    match signal::ctrl_c().await {
        Ok(()) => logging::log_shutdown(ProcessId::current(), "Received Ctrl+C signal"),
        Err(err) => logging::log_error(ProcessId::current(), "Signal handling", &err),
    }

    orchestrator.stop_all_servers().await;
    logging::log_success(ProcessId::current(), "Stack stopped");
    Ok(())
}
