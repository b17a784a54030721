//! Trait definitions with mockall annotations for testing
//!
//! Every side effect the orchestrator has on the machine goes through one of
//! these traits: launching processes, probing HTTP health, probing TCP ports
//! and sweeping stale processes. Real implementations live in `services`.

use async_trait::async_trait;
use shared::StackRole;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::OrchestratorResult;

/// Everything needed to start one role's process
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub role: StackRole,
    pub port: u16,
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// Program followed by its arguments
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Which stale processes a sweep may kill
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRule {
    /// Exact `KEY=value` environment entry stamped on our own children
    pub owner_env: (String, String),
    /// Substring every stack command line contains
    pub program_marker: String,
    /// Command line must also contain one of these
    pub role_keywords: Vec<String>,
}

impl SweepRule {
    /// Command-line heuristic: marker and at least one role keyword
    pub fn matches_command(&self, cmdline: &str) -> bool {
        !self.program_marker.is_empty()
            && cmdline.contains(&self.program_marker)
            && self.role_keywords.iter().any(|keyword| cmdline.contains(keyword.as_str()))
    }

    /// Exact match on the owner tag in a process environment
    pub fn matches_environ(&self, environ: &[String]) -> bool {
        let (key, value) = &self.owner_env;
        let wanted = format!("{key}={value}");
        environ.iter().any(|entry| *entry == wanted)
    }
}

/// Handle on one spawned OS process
#[mockall::automock]
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// OS pid, `None` once the process has been reaped
    fn pid(&self) -> Option<u32>;

    /// Ask the process to exit (SIGTERM on unix)
    async fn terminate(&mut self) -> OrchestratorResult<()>;

    /// Force the process to exit
    async fn kill(&mut self) -> OrchestratorResult<()>;

    /// Wait for exit and return the exit code, if the OS reported one
    async fn wait(&mut self) -> OrchestratorResult<Option<i32>>;

    /// Whether the process has not exited yet
    fn is_running(&mut self) -> bool;
}

/// Process launching abstraction
#[mockall::automock]
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the process described by `spec`; returns as soon as the OS has
    /// started it, readiness is checked separately
    async fn launch(&self, spec: &LaunchSpec) -> OrchestratorResult<Box<dyn ProcessHandle>>;
}

/// HTTP health probing abstraction
#[mockall::automock]
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Single GET; true only for a 200 response within `timeout`
    async fn check(&self, url: &str, timeout: Duration) -> bool;

    /// POST to a coordinator's `/list_models` and return the registered names
    async fn list_models(&self, url: &str, timeout: Duration) -> OrchestratorResult<Vec<String>>;
}

/// TCP port probing abstraction
#[mockall::automock]
#[async_trait]
pub trait PortProbe: Send + Sync {
    /// True when a connect to `host:port` fails, i.e. nothing is listening
    async fn is_port_free(&self, host: &str, port: u16) -> bool;
}

/// Stale process cleanup abstraction
#[mockall::automock]
#[async_trait]
pub trait ProcessSweeper: Send + Sync {
    /// Force-kill every process with a socket on `port`; returns how many exited
    async fn kill_processes_on_port(&self, port: u16, wait: Duration) -> usize;

    /// Force-kill every process matching `rule`; returns how many exited
    async fn kill_matching(&self, rule: &SweepRule, wait: Duration) -> usize;
}
