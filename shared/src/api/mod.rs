//! HTTP wire types spoken by the stack services
//!
//! - `coordinator`: model registry and worker registration
//! - `worker`: generation requests routed to a worker
//! - `gateway`: OpenAI-compatible models and chat completions

pub mod coordinator;
pub mod gateway;
pub mod worker;

pub use coordinator::{ModelNames, RegisterWorkerRequest, WorkerAddressRequest, WorkerAddressResponse, WorkerStatus};
pub use gateway::{
    ApiError, ApiErrorBody, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, ModelCard,
    ModelList, Usage,
};
pub use worker::{GenerateRequest, GenerateResponse};
