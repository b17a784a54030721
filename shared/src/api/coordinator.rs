//! Coordinator endpoints: `/list_models`, `/register_worker`, `/get_worker_address`

use serde::{Deserialize, Serialize};

/// Body of `POST /list_models`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelNames {
    pub models: Vec<String>,
}

impl ModelNames {
    /// Whether `model` is served, either verbatim, by the last path segment
    /// workers register under, or as a substring of a listed name
    pub fn serves(&self, model: &str) -> bool {
        if self.serves_exactly(model) {
            return true;
        }
        !model.trim().is_empty() && self.models.iter().any(|listed| listed.contains(model))
    }

    /// Verbatim or last-path-segment match only; an empty name never matches
    pub fn serves_exactly(&self, model: &str) -> bool {
        if model.trim().is_empty() {
            return false;
        }
        let short_name = model.rsplit('/').next().unwrap_or(model);
        self.models.iter().any(|listed| listed == model || listed == short_name)
    }
}

/// Load report a worker sends when it registers or heartbeats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub model_names: Vec<String>,
    pub speed: u32,
    pub queue_length: u32,
}

/// Body of `POST /register_worker`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterWorkerRequest {
    pub worker_name: String,
    #[serde(default)]
    pub check_heart_beat: bool,
    pub worker_status: Option<WorkerStatus>,
}

/// Body of `POST /get_worker_address`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerAddressRequest {
    pub model: String,
}

/// Reply of `POST /get_worker_address`; empty address when nobody serves the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerAddressResponse {
    pub address: String,
}
