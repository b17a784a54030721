//! Service implementations
//!
//! Real implementations of the traits in `crate::traits`. These are the only
//! places that touch processes, sockets and HTTP.

pub mod health;
pub mod port_probe;
pub mod process_manager;
pub mod process_output_handler;
pub mod sweeper;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use health::HttpHealthProbe;
pub use port_probe::TcpPortProbe;
pub use process_manager::{ChildProcess, RealProcessLauncher};
pub use sweeper::RealProcessSweeper;
