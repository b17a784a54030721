//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::errors::SharedError;

/// Global process ID singleton - set once at startup
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Role a process plays inside the inference stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StackRole {
    /// Tracks live workers and the models they serve
    Coordinator,
    /// Loads one model, numbered from 0 in launch order
    Worker(u32),
    /// OpenAI-compatible HTTP surface in front of the coordinator
    Gateway,
}

impl StackRole {
    /// Roles that must be healthy before this one may start
    pub fn dependencies(&self) -> &'static [StackRole] {
        match self {
            StackRole::Coordinator => &[],
            StackRole::Worker(_) | StackRole::Gateway => &[StackRole::Coordinator],
        }
    }

    pub fn is_worker(&self) -> bool {
        matches!(self, StackRole::Worker(_))
    }
}

impl fmt::Display for StackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackRole::Coordinator => write!(f, "coordinator"),
            StackRole::Worker(n) => write!(f, "worker_{n}"),
            StackRole::Gateway => write!(f, "gateway"),
        }
    }
}

impl FromStr for StackRole {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coordinator" => Ok(StackRole::Coordinator),
            "gateway" => Ok(StackRole::Gateway),
            other => other
                .strip_prefix("worker_")
                .and_then(|n| n.parse::<u32>().ok())
                .map(StackRole::Worker)
                .ok_or_else(|| SharedError::InvalidRole { input: s.to_string() }),
        }
    }
}

/// Process identifier for any component in the system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// Orchestrator process (singleton)
    Orchestrator,
    /// A stand-in stack service playing the given role
    Service(StackRole),
}

impl ProcessId {
    /// Initialize the global process ID for the orchestrator
    pub fn init_orchestrator() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Orchestrator)
    }

    /// Initialize the global process ID for a stack service
    pub fn init_service(role: StackRole) -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Service(role))
    }

    /// Get the global process ID, defaulting to the orchestrator when no
    /// binary entry point has initialized it (library use, tests)
    pub fn current() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Orchestrator)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Orchestrator => write!(f, "orchestrator"),
            ProcessId::Service(role) => write!(f, "{role}"),
        }
    }
}
