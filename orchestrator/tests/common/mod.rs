//! Common test utilities and infrastructure
//!
//! Shared fixtures and the mock-backed orchestrator builder used by both
//! test suites.

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
pub use helpers::{OrchestratorBuilder, Recorder, TestHelpers, TestOrchestrator};
