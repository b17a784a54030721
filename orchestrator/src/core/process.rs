//! Records kept about managed processes and what the orchestrator reports back

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::StackRole;
use std::fmt;

use crate::traits::ProcessHandle;

/// A launched process owned by the orchestrator
pub struct ManagedProcess {
    pub role: StackRole,
    pub port: u16,
    pub command: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub pid: Option<u32>,
    handle: Box<dyn ProcessHandle>,
}

impl ManagedProcess {
    pub fn new(role: StackRole, port: u16, command: Vec<String>, handle: Box<dyn ProcessHandle>) -> Self {
        Self {
            role,
            port,
            command,
            started_at: Utc::now(),
            pid: handle.pid(),
            handle,
        }
    }

    pub fn handle_mut(&mut self) -> &mut dyn ProcessHandle {
        self.handle.as_mut()
    }

    pub fn is_running(&mut self) -> bool {
        self.handle.is_running()
    }
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("role", &self.role)
            .field("port", &self.port)
            .field("pid", &self.pid)
            .field("command", &self.command.join(" "))
            .field("started_at", &self.started_at)
            .finish()
    }
}

/// Ports of a successfully started stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackPorts {
    pub coordinator: u16,
    pub worker: u16,
    pub gateway: u16,
}

impl StackPorts {
    pub fn all(&self) -> [u16; 3] {
        [self.coordinator, self.worker, self.gateway]
    }
}

/// Live view of the stack, re-probed on every query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackStatus {
    pub coordinator: Option<u16>,
    pub gateway: Option<u16>,
    pub workers: Vec<u16>,
}

impl StackStatus {
    pub fn is_up(&self) -> bool {
        self.coordinator.is_some() && self.gateway.is_some()
    }
}

/// Non-fatal events the caller may want to inspect after the fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackWarning {
    /// Worker never showed up in the coordinator's model list
    WorkerNotRegistered {
        role: StackRole,
        model: String,
        coordinator_port: u16,
    },
    /// A process could not be stopped cleanly
    StopFailed { role: StackRole, reason: String },
}

impl fmt::Display for StackWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackWarning::WorkerNotRegistered {
                role,
                model,
                coordinator_port,
            } => write!(
                f,
                "{role} did not register model '{model}' with coordinator on port {coordinator_port}"
            ),
            StackWarning::StopFailed { role, reason } => write!(f, "{role} did not stop cleanly: {reason}"),
        }
    }
}
