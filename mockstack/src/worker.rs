//! Model worker: registers one model with the coordinator and answers
//! generation requests with canned text

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use shared::api::{
    ChatMessage, GenerateRequest, GenerateResponse, ModelNames, RegisterWorkerRequest, Usage, WorkerStatus,
};
use shared::{process_info, process_warn, ProcessId};
use std::time::Duration;

use crate::error::{MockStackError, MockStackResult};
use crate::responses::{canned_reply, count_tokens};

const REGISTER_ATTEMPTS: u32 = 10;
const REGISTER_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Name a worker registers under: the last path segment of its model path
pub fn model_name(model_path: &str) -> String {
    let trimmed = model_path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
}

#[derive(Debug, Clone)]
pub struct WorkerState {
    pub model_name: String,
    pub worker_address: String,
}

impl WorkerState {
    pub fn new(model_path: &str, worker_address: impl Into<String>) -> Self {
        Self {
            model_name: model_name(model_path),
            worker_address: worker_address.into(),
        }
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            model_names: vec![self.model_name.clone()],
            speed: 1,
            queue_length: 0,
        }
    }
}

pub fn router(state: WorkerState) -> Router {
    Router::new()
        .route("/worker_get_status", post(worker_get_status))
        .route("/worker_generate", post(worker_generate))
        .with_state(state)
}

async fn worker_get_status(State(state): State<WorkerState>) -> Json<WorkerStatus> {
    Json(state.status())
}

async fn worker_generate(
    State(state): State<WorkerState>,
    Json(request): Json<GenerateRequest>,
) -> MockStackResult<Json<GenerateResponse>> {
    let served = ModelNames {
        models: vec![state.model_name.clone()],
    };
    if !served.serves(&request.model) {
        return Err(MockStackError::UnknownModel {
            model: request.model,
            available: served.models,
        });
    }
    Ok(Json(generate(&request.messages, request.max_tokens)))
}

/// Canned reply to the last user message, cut to `max_tokens` words
pub fn generate(messages: &[ChatMessage], max_tokens: Option<u32>) -> GenerateResponse {
    let prompt_tokens: u32 = messages.iter().map(|m| count_tokens(&m.content)).sum();
    let user_message = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or_default();

    let mut text = canned_reply(user_message);
    let mut finish_reason = "stop";
    if let Some(limit) = max_tokens {
        if count_tokens(&text) > limit {
            text = text.split_whitespace().take(limit as usize).collect::<Vec<_>>().join(" ");
            finish_reason = "length";
        }
    }

    GenerateResponse {
        usage: Usage::new(prompt_tokens, count_tokens(&text)),
        text,
        finish_reason: finish_reason.to_string(),
    }
}

/// Announce this worker to the coordinator at `controller`, retrying while
/// the coordinator is unreachable
pub async fn register(client: &reqwest::Client, controller: &str, state: &WorkerState) -> MockStackResult<()> {
    let url = format!("{}/register_worker", controller.trim_end_matches('/'));
    let request = RegisterWorkerRequest {
        worker_name: state.worker_address.clone(),
        check_heart_beat: true,
        worker_status: Some(state.status()),
    };

    let mut last_error = String::new();
    for attempt in 1..=REGISTER_ATTEMPTS {
        match client.post(&url).json(&request).send().await {
            Ok(response) if response.status().is_success() => {
                process_info!(
                    ProcessId::current(),
                    "📝 Registered '{}' with {}",
                    state.model_name,
                    controller
                );
                return Ok(());
            }
            Ok(response) => last_error = format!("status {}", response.status()),
            Err(e) => last_error = e.to_string(),
        }
        process_warn!(
            ProcessId::current(),
            "⚠️ Registration attempt {} failed: {}",
            attempt,
            last_error
        );
        tokio::time::sleep(REGISTER_RETRY_INTERVAL).await;
    }
    Err(MockStackError::upstream(url, last_error))
}
