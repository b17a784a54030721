//! Core orchestration building blocks
//!
//! Port bookkeeping, readiness polling and the records the orchestrator keeps
//! about each managed process. I/O happens only through the injected traits.

pub mod polling;
pub mod ports;
pub mod process;

pub use polling::wait_for_service;
pub use ports::{scan_for_free_port, PortPool};
pub use process::{ManagedProcess, StackPorts, StackStatus, StackWarning};
