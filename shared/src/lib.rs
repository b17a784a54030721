//! Shared types for the local inference stack
//!
//! Contains the role identifiers, logging setup and HTTP wire types used by
//! both the orchestrator and the stand-in stack services.

pub mod api;
pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
