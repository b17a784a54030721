//! Stale process and port cleanup
//!
//! Port owners are found with `lsof`, command lines and environments are read
//! through `sysinfo`. Matching processes are force-killed and given a bounded
//! time to disappear. Everything here is best-effort: failures are logged and
//! counted, never returned.

use async_trait::async_trait;
use shared::{process_debug, process_info, process_warn, ProcessId};
use std::time::Duration;
use sysinfo::{Pid, ProcessStatus, System};
use tokio::process::Command;
use tokio::time::{sleep, Instant};

use crate::traits::{ProcessSweeper, SweepRule};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sweeper acting on the real OS process table
#[derive(Debug, Clone)]
pub struct RealProcessSweeper {
    own_pid: u32,
}

impl RealProcessSweeper {
    pub fn new() -> Self {
        Self {
            own_pid: std::process::id(),
        }
    }

    /// PIDs with a listening TCP socket on `port`
    async fn find_processes_using_port(&self, port: u16) -> Vec<u32> {
        let output = match Command::new("lsof")
            .arg("-t") // PIDs only
            .arg(format!("-iTCP:{port}"))
            .arg("-sTCP:LISTEN")
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                process_warn!(ProcessId::current(), "⚠️ Cannot run lsof to inspect port {}: {}", port, e);
                return Vec::new();
            }
        };

        // lsof exits non-zero when nothing matches
        if !output.status.success() {
            return Vec::new();
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .filter(|pid| *pid != self.own_pid)
            .collect()
    }

    /// PIDs and names of processes matching `rule`, excluding ourselves
    async fn find_matching_processes(&self, rule: &SweepRule) -> Vec<(u32, String)> {
        let rule = rule.clone();
        let own_pid = self.own_pid;

        // Full process table scan is blocking; keep it off the runtime threads
        tokio::task::spawn_blocking(move || {
            let system = System::new_all();
            system
                .processes()
                .iter()
                .filter(|(pid, _)| pid.as_u32() != own_pid)
                .filter(|(_, process)| !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
                .filter(|(_, process)| {
                    rule.matches_environ(process.environ()) || rule.matches_command(&process.cmd().join(" "))
                })
                .map(|(pid, process)| (pid.as_u32(), process.name().to_string()))
                .collect()
        })
        .await
        .unwrap_or_default()
    }

    /// Send a forced kill and wait up to `wait` for the process to go away
    async fn force_kill(&self, pid: u32, wait: Duration) -> bool {
        if !send_kill(pid) {
            return process_gone(pid).await;
        }

        let deadline = Instant::now() + wait;
        loop {
            if process_gone(pid).await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(EXIT_POLL_INTERVAL).await;
        }
    }
}

impl Default for RealProcessSweeper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn send_kill(pid: u32) -> bool {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;

    match signal::kill(NixPid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => true,
        Err(e) => {
            process_debug!(ProcessId::current(), "SIGKILL to {} failed: {}", pid, e);
            false
        }
    }
}

#[cfg(not(unix))]
fn send_kill(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_process(Pid::from_u32(pid));
    system.process(Pid::from_u32(pid)).map(|p| p.kill()).unwrap_or(false)
}

/// Gone means absent from the process table or only a zombie awaiting its parent
async fn process_gone(pid: u32) -> bool {
    tokio::task::spawn_blocking(move || {
        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        if !system.refresh_process(pid) {
            return true;
        }
        match system.process(pid) {
            None => true,
            Some(process) => matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
        }
    })
    .await
    .unwrap_or(false)
}

#[async_trait]
impl ProcessSweeper for RealProcessSweeper {
    async fn kill_processes_on_port(&self, port: u16, wait: Duration) -> usize {
        let mut killed = 0;
        for pid in self.find_processes_using_port(port).await {
            process_info!(ProcessId::current(), "🔪 Killing process {} using port {}", pid, port);
            if self.force_kill(pid, wait).await {
                killed += 1;
            } else {
                process_warn!(
                    ProcessId::current(),
                    "⚠️ Process {} on port {} still alive after {:?}",
                    pid,
                    port,
                    wait
                );
            }
        }
        killed
    }

    async fn kill_matching(&self, rule: &SweepRule, wait: Duration) -> usize {
        let mut killed = 0;
        for (pid, name) in self.find_matching_processes(rule).await {
            process_info!(ProcessId::current(), "🔪 Killing stale stack process {} ({})", pid, name);
            if self.force_kill(pid, wait).await {
                killed += 1;
            } else {
                process_warn!(ProcessId::current(), "⚠️ Stale process {} still alive after {:?}", pid, wait);
            }
        }
        killed
    }
}
