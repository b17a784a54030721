//! Main orchestrator implementation
//!
//! `StackOrchestrator` brings up coordinator, worker and gateway in dependency
//! order, tracks every process it launched, and tears them all down again.
//! All side effects go through the injected services, so the whole flow runs
//! against mocks in tests.

use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use shared::api::ModelNames;
use shared::{process_debug, process_error, process_info, process_warn, ProcessId, StackRole};

use crate::config::{StackConfig, INSTANCE_ENV_KEY, OWNER_ENV_KEY};
use crate::core::{scan_for_free_port, wait_for_service, ManagedProcess, PortPool, StackPorts, StackStatus, StackWarning};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::services::{HttpHealthProbe, RealProcessLauncher, RealProcessSweeper, TcpPortProbe};
use crate::traits::{HealthProbe, LaunchSpec, PortProbe, ProcessLauncher, ProcessSweeper, SweepRule};

const COORDINATOR_HEALTH_PATH: &str = "/list_models";
const GATEWAY_HEALTH_PATH: &str = "/v1/models";

/// Orchestrator wired to the real OS services
pub type RealStackOrchestrator =
    StackOrchestrator<RealProcessLauncher, HttpHealthProbe, TcpPortProbe, RealProcessSweeper>;

/// Owns the processes of one inference stack
pub struct StackOrchestrator<L, H, P, S>
where
    L: ProcessLauncher + 'static,
    H: HealthProbe + 'static,
    P: PortProbe + 'static,
    S: ProcessSweeper + 'static,
{
    config: StackConfig,

    /// Stamped on every child so a later sweep can tell our processes apart
    instance_id: Uuid,

    /// Injected services
    launcher: L,
    health: H,
    port_probe: P,
    sweeper: S,

    /// Launch order is kept; shutdown walks it backwards
    processes: Vec<ManagedProcess>,
    port_pool: PortPool,
    warnings: Vec<StackWarning>,
}

impl RealStackOrchestrator {
    /// Validate `config` and wire up the real launcher, probes and sweeper
    pub fn from_config(config: StackConfig) -> OrchestratorResult<Self> {
        config.validate()?;
        let port_probe = TcpPortProbe::new(config.port_probe_timeout);
        Ok(Self::new(
            config,
            RealProcessLauncher::new(),
            HttpHealthProbe::new()?,
            port_probe,
            RealProcessSweeper::new(),
        ))
    }
}

impl<L, H, P, S> StackOrchestrator<L, H, P, S>
where
    L: ProcessLauncher + 'static,
    H: HealthProbe + 'static,
    P: PortProbe + 'static,
    S: ProcessSweeper + 'static,
{
    /// Create new orchestrator with injected dependencies
    pub fn new(config: StackConfig, launcher: L, health: H, port_probe: P, sweeper: S) -> Self {
        Self {
            config,
            instance_id: Uuid::new_v4(),
            launcher,
            health,
            port_probe,
            sweeper,
            processes: Vec::new(),
            port_pool: PortPool::new(),
            warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    // ---- Ports ----

    /// First port at or above `start` with nothing listening and not already
    /// handed out by this orchestrator
    pub async fn find_free_port(&self, start: u16, max_attempts: u16) -> OrchestratorResult<u16> {
        let port = scan_for_free_port(&self.port_probe, &self.config.host, start, max_attempts, &self.port_pool).await?;
        process_debug!(ProcessId::current(), "🔍 Port {} is free (scan from {})", port, start);
        Ok(port)
    }

    /// `find_free_port` with the configured attempt budget
    pub async fn next_free_port(&self, start: u16) -> OrchestratorResult<u16> {
        self.find_free_port(start, self.config.port_scan_attempts).await
    }

    // ---- Cleanup ----

    /// Force-kill whatever holds `port`; returns how many processes exited
    pub async fn kill_processes_on_port(&self, port: u16) -> usize {
        self.sweeper.kill_processes_on_port(port, self.config.cleanup.kill_wait).await
    }

    fn sweep_rule(&self) -> SweepRule {
        SweepRule {
            owner_env: (OWNER_ENV_KEY.to_string(), self.config.owner_tag.clone()),
            program_marker: self.config.cleanup.program_marker.clone(),
            role_keywords: self.config.cleanup.role_keywords.clone(),
        }
    }

    /// Best-effort removal of stack processes left over from earlier runs,
    /// then of anything still sitting on the well-known ports
    pub async fn cleanup_existing_servers(&self) {
        let cleanup = &self.config.cleanup;
        if !cleanup.enabled {
            process_debug!(ProcessId::current(), "🧹 Cleanup disabled, skipping sweep");
            return;
        }

        process_info!(ProcessId::current(), "🧹 Cleaning up existing stack processes");
        let swept = self.sweeper.kill_matching(&self.sweep_rule(), cleanup.kill_wait).await;
        if swept > 0 {
            process_info!(ProcessId::current(), "🧹 Killed {} stale stack processes", swept);
        }

        for port in cleanup.ports_to_clear(&self.config.topology) {
            if !self.port_probe.is_port_free(&self.config.host, port).await {
                process_info!(ProcessId::current(), "🧹 Port {} is occupied, clearing it", port);
                self.kill_processes_on_port(port).await;
            }
        }

        sleep(cleanup.settle).await;
    }

    // ---- Startup ----

    fn child_env(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (OWNER_ENV_KEY.to_string(), self.config.owner_tag.clone()),
            (INSTANCE_ENV_KEY.to_string(), self.instance_id.to_string()),
        ])
    }

    /// Spawn `role` on `port` and start tracking it. Tracking starts before any
    /// health check so a failed start is still torn down.
    async fn launch(&mut self, role: StackRole, port: u16, role_args: Vec<String>) -> OrchestratorResult<()> {
        let template = self.config.commands.for_role(role).clone();
        let mut args = template.args;
        args.extend(role_args);

        let spec = LaunchSpec {
            role,
            port,
            program: template.program,
            args,
            env: self.child_env(),
        };

        process_info!(ProcessId::current(), "🚀 Starting {} on port {}", role, port);
        process_debug!(ProcessId::current(), "🚀 {} command: {}", role, spec.command_line().join(" "));

        let handle = self.launcher.launch(&spec).await?;
        self.port_pool.claim(port);
        self.processes
            .push(ManagedProcess::new(role, port, spec.command_line(), handle));
        Ok(())
    }

    fn host_args(&self, port: u16) -> Vec<String> {
        vec![
            "--host".to_string(),
            self.config.host.clone(),
            "--port".to_string(),
            port.to_string(),
        ]
    }

    async fn await_healthy(&self, role: StackRole, port: u16, path: &str) -> OrchestratorResult<()> {
        let url = format!("{}{}", self.config.base_url(port), path);
        if wait_for_service(&self.health, &url, &self.config.health).await {
            process_info!(ProcessId::current(), "✅ {} ready on port {}", role, port);
            Ok(())
        } else {
            Err(OrchestratorError::Startup {
                role,
                url,
                timeout: self.config.health.timeout,
            })
        }
    }

    /// Port of the first tracked coordinator, if any
    pub fn coordinator_port(&self) -> Option<u16> {
        self.port_of(StackRole::Coordinator)
    }

    fn port_of(&self, role: StackRole) -> Option<u16> {
        self.processes.iter().find(|p| p.role == role).map(|p| p.port)
    }

    /// Every role `dependent` relies on must be tracked and healthy right now
    async fn ensure_dependencies_ready(&mut self, dependent: StackRole) -> OrchestratorResult<()> {
        for &dependency in dependent.dependencies() {
            if !self.is_role_healthy(dependency).await {
                return Err(OrchestratorError::DependencyNotReady {
                    role: dependent,
                    dependency,
                });
            }
        }
        Ok(())
    }

    /// Servers must answer their health path; workers only need to be running
    async fn is_role_healthy(&mut self, role: StackRole) -> bool {
        let path = match role {
            StackRole::Coordinator => COORDINATOR_HEALTH_PATH,
            StackRole::Gateway => GATEWAY_HEALTH_PATH,
            StackRole::Worker(_) => {
                return self
                    .processes
                    .iter_mut()
                    .find(|p| p.role == role)
                    .is_some_and(|p| p.is_running());
            }
        };
        match self.port_of(role) {
            Some(port) => {
                let url = format!("{}{}", self.config.base_url(port), path);
                self.health.check(&url, self.config.health.request_timeout).await
            }
            None => false,
        }
    }

    /// Coordinator port once every dependency of `dependent` is ready
    async fn ready_coordinator(&mut self, dependent: StackRole) -> OrchestratorResult<u16> {
        self.ensure_dependencies_ready(dependent).await?;
        self.coordinator_port().ok_or(OrchestratorError::DependencyNotReady {
            role: dependent,
            dependency: StackRole::Coordinator,
        })
    }

    /// Launch a coordinator and wait until it answers `GET /list_models`
    pub async fn start_coordinator(&mut self) -> OrchestratorResult<u16> {
        let role = StackRole::Coordinator;
        let port = self.next_free_port(self.config.topology.base_port(role)).await?;
        self.launch(role, port, self.host_args(port)).await?;
        self.await_healthy(role, port, COORDINATOR_HEALTH_PATH).await?;
        Ok(port)
    }

    /// Launch a worker for `model` against the running coordinator.
    /// A worker that never registers is recorded as a warning, not an error.
    pub async fn start_worker(&mut self, model: &str) -> OrchestratorResult<u16> {
        let index = self.processes.iter().filter(|p| p.role.is_worker()).count() as u32;
        let role = StackRole::Worker(index);
        let coordinator_port = self.ready_coordinator(role).await?;

        let port = self.next_free_port(self.config.topology.base_port(role)).await?;
        let mut args = vec![
            "--model-path".to_string(),
            model.to_string(),
            "--controller".to_string(),
            self.config.base_url(coordinator_port),
            "--worker-address".to_string(),
            self.config.base_url(port),
        ];
        args.extend(self.host_args(port));
        self.launch(role, port, args).await?;

        if self.worker_registered(model, coordinator_port).await {
            process_info!(ProcessId::current(), "✅ {} registered model '{}'", role, model);
        } else {
            let warning = StackWarning::WorkerNotRegistered {
                role,
                model: model.to_string(),
                coordinator_port,
            };
            process_warn!(ProcessId::current(), "⚠️ {}", warning);
            self.warnings.push(warning);
        }
        Ok(port)
    }

    /// Sleep through the grace period, then ask the coordinator which models
    /// it knows about; re-checks up to `retries` times
    async fn worker_registered(&self, model: &str, coordinator_port: u16) -> bool {
        let policy = &self.config.registration;
        sleep(policy.grace).await;

        let url = format!("{}{}", self.config.base_url(coordinator_port), COORDINATOR_HEALTH_PATH);
        for attempt in 0..=policy.retries {
            if attempt > 0 {
                sleep(policy.retry_interval).await;
            }
            match self.health.list_models(&url, policy.request_timeout).await {
                Ok(models) => {
                    if (ModelNames { models }).serves(model) {
                        return true;
                    }
                }
                Err(e) => {
                    process_debug!(ProcessId::current(), "Registration check {} failed: {}", attempt + 1, e);
                }
            }
        }
        false
    }

    /// Launch the gateway against the running coordinator and wait until it
    /// answers `GET /v1/models`
    pub async fn start_gateway(&mut self) -> OrchestratorResult<u16> {
        let role = StackRole::Gateway;
        let coordinator_port = self.ready_coordinator(role).await?;

        let port = self.next_free_port(self.config.topology.base_port(role)).await?;
        let mut args = vec![
            "--controller-address".to_string(),
            self.config.base_url(coordinator_port),
        ];
        args.extend(self.host_args(port));
        self.launch(role, port, args).await?;
        self.await_healthy(role, port, GATEWAY_HEALTH_PATH).await?;
        Ok(port)
    }

    /// Clean up, then start coordinator, one worker and gateway in order.
    /// On any failure every process started so far is stopped before the
    /// error is returned.
    pub async fn start_full_stack(&mut self, model: &str) -> OrchestratorResult<StackPorts> {
        if !self.processes.is_empty() {
            process_warn!(
                ProcessId::current(),
                "⚠️ {} processes still tracked, stopping them before a fresh start",
                self.processes.len()
            );
            self.stop_all_servers().await;
        }

        self.cleanup_existing_servers().await;

        match self.start_roles(model).await {
            Ok(ports) => {
                process_info!(
                    ProcessId::current(),
                    "✅ Stack up: coordinator {}, worker {}, gateway {}",
                    ports.coordinator,
                    ports.worker,
                    ports.gateway
                );
                Ok(ports)
            }
            Err(e) => {
                process_error!(ProcessId::current(), "❌ Stack startup failed: {}", e);
                self.stop_all_servers().await;
                Err(e)
            }
        }
    }

    async fn start_roles(&mut self, model: &str) -> OrchestratorResult<StackPorts> {
        let coordinator = self.start_coordinator().await?;
        let worker = self.start_worker(model).await?;
        let gateway = self.start_gateway().await?;
        Ok(StackPorts {
            coordinator,
            worker,
            gateway,
        })
    }

    // ---- Shutdown ----

    /// Stop every tracked process, newest first. Never fails: problems are
    /// logged and recorded as warnings, and the tables are always cleared.
    pub async fn stop_all_servers(&mut self) {
        let mut processes = std::mem::take(&mut self.processes);
        if !processes.is_empty() {
            process_info!(ProcessId::current(), "🛑 Stopping {} stack processes", processes.len());
        }

        let graceful = self.config.shutdown.graceful_timeout;
        while let Some(mut process) = processes.pop() {
            match stop_process(&mut process, graceful).await {
                Ok(()) => {
                    process_debug!(ProcessId::current(), "🛑 Stopped {} on port {}", process.role, process.port);
                }
                Err(e) => {
                    process_error!(ProcessId::current(), "❌ {}", e);
                    self.warnings.push(StackWarning::StopFailed {
                        role: process.role,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.port_pool.clear();
    }

    // ---- Queries ----

    /// Probe every tracked role; nothing is cached between calls
    pub async fn get_status(&mut self) -> StackStatus {
        let request_timeout = self.config.health.request_timeout;
        let mut status = StackStatus::default();

        for index in 0..self.processes.len() {
            let (role, port) = (self.processes[index].role, self.processes[index].port);
            match role {
                StackRole::Coordinator if status.coordinator.is_none() => {
                    let url = format!("{}{}", self.config.base_url(port), COORDINATOR_HEALTH_PATH);
                    if self.health.check(&url, request_timeout).await {
                        status.coordinator = Some(port);
                    }
                }
                StackRole::Gateway if status.gateway.is_none() => {
                    let url = format!("{}{}", self.config.base_url(port), GATEWAY_HEALTH_PATH);
                    if self.health.check(&url, request_timeout).await {
                        status.gateway = Some(port);
                    }
                }
                StackRole::Worker(_) => {
                    if self.processes[index].is_running() {
                        status.workers.push(port);
                    }
                }
                _ => {}
            }
        }
        status
    }

    pub fn gateway_port(&self) -> Option<u16> {
        self.port_of(StackRole::Gateway)
    }

    /// `http://<host>:<gateway port>`, what OpenAI-compatible clients point at
    pub fn gateway_base_url(&self) -> Option<String> {
        self.gateway_port().map(|port| self.config.base_url(port))
    }

    pub async fn is_gateway_alive(&self) -> bool {
        match self.gateway_port() {
            Some(port) => {
                let url = format!("{}{}", self.config.base_url(port), GATEWAY_HEALTH_PATH);
                self.health.check(&url, self.config.health.request_timeout).await
            }
            None => false,
        }
    }

    /// Ports of the first coordinator, worker and gateway, if all three are tracked
    pub fn ports(&self) -> Option<StackPorts> {
        Some(StackPorts {
            coordinator: self.coordinator_port()?,
            worker: self.processes.iter().find(|p| p.role.is_worker())?.port,
            gateway: self.gateway_port()?,
        })
    }

    pub fn processes(&self) -> &[ManagedProcess] {
        &self.processes
    }

    pub fn claimed_ports(&self) -> &[u16] {
        self.port_pool.as_slice()
    }

    pub fn warnings(&self) -> &[StackWarning] {
        &self.warnings
    }
}

/// Graceful terminate, bounded wait, then forced kill and an unbounded wait
async fn stop_process(process: &mut ManagedProcess, graceful: Duration) -> OrchestratorResult<()> {
    let role = process.role;
    let handle = process.handle_mut();

    if let Err(e) = handle.terminate().await {
        process_warn!(ProcessId::current(), "⚠️ {}, forcing kill", e);
        handle.kill().await?;
        return handle.wait().await.map(|_| ());
    }

    let graceful_exit = timeout(graceful, handle.wait()).await;
    match graceful_exit {
        Ok(Ok(_)) => return Ok(()),
        Ok(Err(e)) => {
            process_warn!(ProcessId::current(), "⚠️ Waiting for {} failed: {}, killing", role, e);
        }
        Err(_) => {
            process_warn!(
                ProcessId::current(),
                "⏱️ {} did not exit within {:?}, killing",
                role,
                graceful
            );
        }
    }

    handle.kill().await?;
    handle.wait().await.map(|_| ())
}
