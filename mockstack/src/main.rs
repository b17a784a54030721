//! Mock stack entry point
//!
//! Each subcommand plays one role and accepts the flags the orchestrator
//! passes to the real service.

use anyhow::Context;
use clap::{Parser, Subcommand};
use shared::{logging, process_info, ProcessId, StackRole};
use std::time::Duration;

use mockstack::coordinator::{self, CoordinatorState};
use mockstack::gateway::{self, GatewayState};
use mockstack::worker::{self, WorkerState};

#[derive(Parser, Debug)]
#[command(name = "mockstack")]
#[command(about = "Stand-in coordinator, worker and gateway for exercising the orchestrator")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Model registry on `/list_models`
    Coordinator {
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value = "21001")]
        port: u16,
    },

    /// Serves one model and registers it with the coordinator
    Worker {
        #[arg(long)]
        model_path: String,
        /// Coordinator base URL
        #[arg(long, alias = "controller-address")]
        controller: String,
        /// URL the coordinator should route requests to
        #[arg(long)]
        worker_address: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value = "21002")]
        port: u16,
        /// Wait before registering
        #[arg(long, default_value = "0")]
        register_delay_ms: u64,
        /// Never register; the coordinator will not list this model
        #[arg(long)]
        skip_registration: bool,
        /// Index shown in log lines
        #[arg(long, default_value = "0")]
        index: u32,
    },

    /// OpenAI-compatible API in front of the coordinator
    Gateway {
        #[arg(long)]
        controller_address: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value = "8000")]
        port: u16,
    },

    /// Accepts any arguments and never listens
    Idle {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.role {
        Role::Coordinator { host, port } => {
            init(StackRole::Coordinator, &args.log_level);
            let router = coordinator::router(CoordinatorState::new());
            mockstack::serve(router, &host, port).await.context("coordinator server")?;
        }
        Role::Worker {
            model_path,
            controller,
            worker_address,
            host,
            port,
            register_delay_ms,
            skip_registration,
            index,
        } => {
            init(StackRole::Worker(index), &args.log_level);
            let state = WorkerState::new(&model_path, worker_address);
            let server = tokio::spawn({
                let router = worker::router(state.clone());
                async move { mockstack::serve(router, &host, port).await }
            });

            if skip_registration {
                process_info!(ProcessId::current(), "⏭️ Registration skipped");
            } else {
                tokio::time::sleep(Duration::from_millis(register_delay_ms)).await;
                let client = mockstack::http_client()?;
                worker::register(&client, &controller, &state)
                    .await
                    .context("worker registration")?;
            }

            server.await.context("worker server task")??;
        }
        Role::Gateway {
            controller_address,
            host,
            port,
        } => {
            init(StackRole::Gateway, &args.log_level);
            let state = GatewayState::new(&controller_address, mockstack::http_client()?);
            mockstack::serve(gateway::router(state), &host, port)
                .await
                .context("gateway server")?;
        }
        Role::Idle { args: ignored } => {
            logging::init_tracing(Some(&args.log_level));
            process_info!(ProcessId::current(), "💤 Idling, ignoring {} arguments", ignored.len());
            std::future::pending::<()>().await;
        }
    }

    Ok(())
}

fn init(role: StackRole, log_level: &str) {
    ProcessId::init_service(role);
    logging::init_tracing(Some(log_level));
    logging::log_startup(ProcessId::current(), &format!("mock {role}"));
}
