//! Mock stack error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared::api::ApiError;
use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockStackError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Model '{model}' is not served by any worker")]
    UnknownModel { model: String, available: Vec<String> },

    #[error("Upstream request to {url} failed: {message}")]
    Upstream { url: String, message: String },

    #[error("Invalid request: {details}")]
    InvalidRequest { details: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MockStackError {
    pub fn upstream(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Upstream {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

impl IntoResponse for MockStackError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            MockStackError::UnknownModel { model, available } => (
                StatusCode::BAD_REQUEST,
                ApiError::new(
                    format!("Only {} allowed now, your model {}", available.join("&&"), model),
                    "invalid_request_error",
                    40301,
                ),
            ),
            MockStackError::InvalidRequest { details } => (
                StatusCode::BAD_REQUEST,
                ApiError::new(details.clone(), "invalid_request_error", 40001),
            ),
            MockStackError::Upstream { .. } => (
                StatusCode::BAD_GATEWAY,
                ApiError::new(self.to_string(), "server_error", 50001),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(self.to_string(), "server_error", 50000),
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub type MockStackResult<T> = Result<T, MockStackError>;
