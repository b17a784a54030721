//! TCP port probing

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::traits::PortProbe;

/// Treats a port as free when a connect attempt does not succeed in time
#[derive(Debug, Clone)]
pub struct TcpPortProbe {
    connect_timeout: Duration,
}

impl TcpPortProbe {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpPortProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn is_port_free(&self, host: &str, port: u16) -> bool {
        // Refused, unreachable and timed-out connects all mean nobody answered
        !matches!(
            timeout(self.connect_timeout, TcpStream::connect((host, port))).await,
            Ok(Ok(_))
        )
    }
}
