//! Lightweight stand-ins for the inference stack roles
//!
//! One binary, one subcommand per role, accepting the same flags the
//! orchestrator passes to the real services. Used to exercise the
//! orchestrator end to end without a model runtime.

pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod responses;
pub mod worker;

pub use error::{MockStackError, MockStackResult};

use axum::Router;
use shared::{process_info, ProcessId};

/// Bind `host:port` and serve `router` until the process is killed
pub async fn serve(router: Router, host: &str, port: u16) -> MockStackResult<()> {
    let address = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|source| MockStackError::Bind {
            address: address.clone(),
            source,
        })?;

    process_info!(ProcessId::current(), "🌐 Listening on http://{}", address);
    axum::serve(listener, router).await?;
    Ok(())
}

/// Client for calls between roles; local traffic never goes through a proxy
pub fn http_client() -> MockStackResult<reqwest::Client> {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .map_err(|e| MockStackError::upstream("client", e))
}
