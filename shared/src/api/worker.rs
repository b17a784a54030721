//! Worker endpoint: `/worker_generate`

use serde::{Deserialize, Serialize};

use super::gateway::{ChatMessage, Usage};

/// Generation request the gateway forwards to a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    pub usage: Usage,
    pub finish_reason: String,
}
