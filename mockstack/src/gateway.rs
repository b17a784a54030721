//! OpenAI-compatible gateway in front of the coordinator
//!
//! `/v1/models` mirrors the coordinator's model list. Chat completions are
//! routed to whichever worker the coordinator names for the model.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use shared::api::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, GenerateRequest, GenerateResponse,
    ModelCard, ModelList, ModelNames, WorkerAddressRequest, WorkerAddressResponse,
};
use shared::{process_debug, ProcessId};
use std::time::Duration;

use crate::error::{MockStackError, MockStackResult};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
const OWNED_BY: &str = "mockstack";

#[derive(Debug, Clone)]
pub struct GatewayState {
    controller_address: String,
    client: reqwest::Client,
}

impl GatewayState {
    pub fn new(controller_address: &str, client: reqwest::Client) -> Self {
        Self {
            controller_address: controller_address.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn post_json<Req, Resp>(&self, url: String, body: &Req) -> MockStackResult<Resp>
    where
        Req: serde::Serialize + ?Sized,
        Resp: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(&url)
            .timeout(UPSTREAM_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| MockStackError::upstream(&url, e))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(MockStackError::upstream(&url, format!("status {status}")));
        }
        response.json().await.map_err(|e| MockStackError::upstream(&url, e))
    }

    async fn list_models(&self) -> MockStackResult<Vec<String>> {
        let names: ModelNames = self
            .post_json(format!("{}/list_models", self.controller_address), &serde_json::json!({}))
            .await?;
        Ok(names.models)
    }

    async fn worker_address(&self, model: &str) -> MockStackResult<String> {
        let reply: WorkerAddressResponse = self
            .post_json(
                format!("{}/get_worker_address", self.controller_address),
                &WorkerAddressRequest {
                    model: model.to_string(),
                },
            )
            .await?;
        Ok(reply.address)
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(state)
}

async fn list_models(State(state): State<GatewayState>) -> MockStackResult<Json<ModelList>> {
    let created = Utc::now().timestamp();
    let cards = state
        .list_models()
        .await?
        .into_iter()
        .map(|id| ModelCard::new(id, created, OWNED_BY))
        .collect();
    Ok(Json(ModelList::new(cards)))
}

async fn chat_completions(
    State(state): State<GatewayState>,
    Json(request): Json<ChatCompletionRequest>,
) -> MockStackResult<Json<ChatCompletionResponse>> {
    if request.messages.is_empty() {
        return Err(MockStackError::InvalidRequest {
            details: "messages must not be empty".to_string(),
        });
    }

    let address = state.worker_address(&request.model).await?;
    if address.is_empty() {
        return Err(MockStackError::UnknownModel {
            model: request.model,
            available: state.list_models().await.unwrap_or_default(),
        });
    }
    process_debug!(ProcessId::current(), "Routing '{}' to {}", request.model, address);

    let generated: GenerateResponse = state
        .post_json(
            format!("{}/worker_generate", address.trim_end_matches('/')),
            &GenerateRequest {
                model: request.model.clone(),
                messages: request.messages,
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        )
        .await?;

    Ok(Json(ChatCompletionResponse {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        object: "chat.completion".to_string(),
        created: Utc::now().timestamp(),
        model: request.model,
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::assistant(generated.text),
            finish_reason: generated.finish_reason,
        }],
        usage: generated.usage,
    }))
}
