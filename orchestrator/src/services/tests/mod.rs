//! Cross-service tests
//!
//! Exercise the real services together against live local processes and
//! listeners, the way the orchestrator combines them.


// Common test utilities for services
pub mod common {
    use std::time::Duration;
    use tokio::time::timeout;

    /// Standard timeout for async operations in tests
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Helper to run async operations with timeout
    pub async fn with_timeout<T, F>(future: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: std::future::Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future).await
    }

    /// Port that was free a moment ago
    pub fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        listener.local_addr().expect("local addr").port()
    }

    /// Owner tag unique to one test
    pub fn test_owner_tag(name: &str) -> String {
        format!("services-{name}-{}", uuid::Uuid::new_v4())
    }
}
