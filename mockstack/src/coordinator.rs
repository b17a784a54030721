//! Coordinator: model registry that workers register with

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use shared::api::{ModelNames, RegisterWorkerRequest, WorkerAddressRequest, WorkerAddressResponse, WorkerStatus};
use shared::{process_debug, process_info, ProcessId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registered workers keyed by their address
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    workers: Arc<RwLock<BTreeMap<String, WorkerStatus>>>,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, worker_name: String, status: WorkerStatus) {
        self.workers.write().await.insert(worker_name, status);
    }

    /// Every model any worker serves, sorted and deduplicated
    pub async fn models(&self) -> Vec<String> {
        let workers = self.workers.read().await;
        let mut models: Vec<String> = workers
            .values()
            .flat_map(|status| status.model_names.iter().cloned())
            .collect();
        models.sort();
        models.dedup();
        models
    }

    /// Address of a worker serving `model`; exact names win over substrings
    pub async fn worker_for(&self, model: &str) -> Option<String> {
        let workers = self.workers.read().await;
        let names_of = |status: &WorkerStatus| ModelNames {
            models: status.model_names.clone(),
        };
        workers
            .iter()
            .find(|(_, status)| names_of(*status).serves_exactly(model))
            .or_else(|| workers.iter().find(|(_, status)| names_of(*status).serves(model)))
            .map(|(name, _)| name.clone())
    }
}

pub fn router(state: CoordinatorState) -> Router {
    Router::new()
        .route("/list_models", get(list_models).post(list_models))
        .route("/register_worker", post(register_worker))
        .route("/get_worker_address", post(get_worker_address))
        .with_state(state)
}

async fn list_models(State(state): State<CoordinatorState>) -> Json<ModelNames> {
    Json(ModelNames {
        models: state.models().await,
    })
}

async fn register_worker(State(state): State<CoordinatorState>, Json(request): Json<RegisterWorkerRequest>) {
    let status = request.worker_status.unwrap_or_default();
    process_info!(
        ProcessId::current(),
        "📝 Registered worker {} serving {:?}",
        request.worker_name,
        status.model_names
    );
    state.register(request.worker_name, status).await;
}

async fn get_worker_address(
    State(state): State<CoordinatorState>,
    Json(request): Json<WorkerAddressRequest>,
) -> Json<WorkerAddressResponse> {
    let address = state.worker_for(&request.model).await.unwrap_or_default();
    process_debug!(ProcessId::current(), "Worker for '{}': '{}'", request.model, address);
    Json(WorkerAddressResponse { address })
}
