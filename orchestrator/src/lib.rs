//! Orchestrator library for running a local LLM inference stack
//!
//! Starts a coordinator, model workers and an OpenAI-compatible gateway as
//! child processes in dependency order, waits for each to become healthy,
//! and stops them all again. Every OS interaction goes through the traits in
//! [`traits`] so the orchestration logic is testable without real processes.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::StackConfig;
pub use core::{ManagedProcess, PortPool, StackPorts, StackStatus, StackWarning};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{RealStackOrchestrator, StackOrchestrator};
pub use traits::{HealthProbe, PortProbe, ProcessHandle, ProcessLauncher, ProcessSweeper};
