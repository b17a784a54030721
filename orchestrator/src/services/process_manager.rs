//! Real process management service implementation
//!
//! Spawns role processes with tokio, drains their output, and signals them on
//! shutdown. Children are killed when their handle is dropped, so an
//! orchestrator that goes away never leaves them behind.

use async_trait::async_trait;
use shared::{process_debug, ProcessId, StackRole};
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::process_output_handler::spawn_output_consumers;
use crate::traits::{LaunchSpec, ProcessHandle, ProcessLauncher};

/// Real process launcher implementation
#[derive(Debug, Default, Clone)]
pub struct RealProcessLauncher;

impl RealProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for RealProcessLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> OrchestratorResult<Box<dyn ProcessHandle>> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| OrchestratorError::spawn(spec.role, format!("{}: {e}", spec.program)))?;

        spawn_output_consumers(&mut child, spec.role);

        process_debug!(
            ProcessId::current(),
            "🏭 Spawned {} (PID: {}) for port {}",
            spec.role,
            child.id().unwrap_or(0),
            spec.port
        );

        Ok(Box::new(ChildProcess::new(child, spec.role)))
    }
}

/// Handle for a spawned tokio child
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    role: StackRole,
}

impl ChildProcess {
    pub fn new(child: Child, role: StackRole) -> Self {
        Self { child, role }
    }
}

#[async_trait]
impl ProcessHandle for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    #[cfg(unix)]
    async fn terminate(&mut self) -> OrchestratorResult<()> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            // Already reaped
            return Ok(());
        };
        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(OrchestratorError::stop(self.role, format!("SIGTERM to {pid} failed: {e}"))),
        }
    }

    #[cfg(not(unix))]
    async fn terminate(&mut self) -> OrchestratorResult<()> {
        self.kill().await
    }

    async fn kill(&mut self) -> OrchestratorResult<()> {
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // Already exited and reaped
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(OrchestratorError::stop(self.role, format!("kill failed: {e}"))),
        }
    }

    async fn wait(&mut self) -> OrchestratorResult<Option<i32>> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| OrchestratorError::stop(self.role, format!("wait failed: {e}")))?;
        Ok(status.code())
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}
