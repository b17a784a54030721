//! Orchestrator-specific error types

use shared::{SharedError, StackRole};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("No free port in [{start}, {start}+{attempts})")]
    NoFreePort { start: u16, attempts: u16 },

    #[error("{role} did not become healthy at {url} within {timeout:?}")]
    Startup {
        role: StackRole,
        url: String,
        timeout: Duration,
    },

    #[error("Failed to spawn {role}: {message}")]
    Spawn { role: StackRole, message: String },

    #[error("Cannot start {role}: {dependency} is not running")]
    DependencyNotReady { role: StackRole, dependency: StackRole },

    #[error("Failed to stop {role}: {message}")]
    ProcessStop { role: StackRole, message: String },

    #[error("Network communication error: {message}")]
    Network { message: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::ConfigurationError { field: field.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn spawn(role: StackRole, message: impl Into<String>) -> Self {
        Self::Spawn {
            role,
            message: message.into(),
        }
    }

    pub fn stop(role: StackRole, message: impl Into<String>) -> Self {
        Self::ProcessStop {
            role,
            message: message.into(),
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
