//! HTTP health probing over reqwest

use async_trait::async_trait;
use reqwest::StatusCode;
use shared::api::ModelNames;
use std::time::Duration;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::HealthProbe;

/// Health probe backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    /// Client with proxies disabled; every probe targets a local service
    pub fn new() -> OrchestratorResult<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| OrchestratorError::network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, url: &str, timeout: Duration) -> bool {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    async fn list_models(&self, url: &str, timeout: Duration) -> OrchestratorResult<Vec<String>> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| OrchestratorError::network(format!("POST {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::network(format!(
                "POST {url} returned {}",
                response.status()
            )));
        }

        let names: ModelNames = response
            .json()
            .await
            .map_err(|e| OrchestratorError::network(format!("Invalid model list from {url}: {e}")))?;
        Ok(names.models)
    }
}
