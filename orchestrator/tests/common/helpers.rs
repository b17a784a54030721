//! Test helpers and builder patterns for orchestrator tests
//!
//! `OrchestratorBuilder` wires mockall mocks into a `StackOrchestrator` from a
//! few scenario knobs (when the coordinator turns healthy, which models are
//! registered, which ports are busy) and records what the orchestrator did.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use orchestrator::config::StackConfig;
use orchestrator::traits::{
    LaunchSpec, MockHealthProbe, MockPortProbe, MockProcessHandle, MockProcessLauncher, MockProcessSweeper,
    ProcessHandle,
};
use orchestrator::{OrchestratorError, StackOrchestrator};
use shared::StackRole;

use super::fixtures::TestFixtures;

pub type TestOrchestrator =
    StackOrchestrator<MockProcessLauncher, MockHealthProbe, MockPortProbe, MockProcessSweeper>;

/// What the mocked OS saw during a test
#[derive(Clone, Default)]
pub struct Recorder {
    launches: Arc<Mutex<Vec<LaunchSpec>>>,
    terminated: Arc<Mutex<Vec<StackRole>>>,
    coordinator_probes: Arc<AtomicU32>,
}

impl Recorder {
    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launched_roles(&self) -> Vec<StackRole> {
        self.launches().iter().map(|spec| spec.role).collect()
    }

    /// Roles in the order they were asked to terminate
    pub fn terminated(&self) -> Vec<StackRole> {
        self.terminated.lock().unwrap().clone()
    }

    pub fn coordinator_probes(&self) -> u32 {
        self.coordinator_probes.load(Ordering::SeqCst)
    }
}

/// Builder pattern for creating test orchestrators with sensible defaults
pub struct OrchestratorBuilder {
    config: StackConfig,
    coordinator_ready_after: Option<u32>,
    gateway_ready: bool,
    registered_models: Vec<String>,
    busy_ports: Vec<u16>,
    failing_role: Option<StackRole>,
    sweeper: Option<MockProcessSweeper>,
    recorder: Recorder,
}

impl OrchestratorBuilder {
    /// Healthy stack that registers `demo-model`, all ports free
    pub fn new() -> Self {
        Self {
            config: TestFixtures::config(),
            coordinator_ready_after: Some(0),
            gateway_ready: true,
            registered_models: vec![TestFixtures::DEMO_MODEL.to_string()],
            busy_ports: Vec::new(),
            failing_role: None,
            sweeper: None,
            recorder: Recorder::default(),
        }
    }

    pub fn with_config(mut self, config: StackConfig) -> Self {
        self.config = config;
        self
    }

    /// Coordinator health checks fail `failures` times before succeeding
    pub fn coordinator_ready_after(mut self, failures: u32) -> Self {
        self.coordinator_ready_after = Some(failures);
        self
    }

    pub fn coordinator_never_ready(mut self) -> Self {
        self.coordinator_ready_after = None;
        self
    }

    pub fn gateway_never_ready(mut self) -> Self {
        self.gateway_ready = false;
        self
    }

    pub fn registered_models(mut self, models: &[&str]) -> Self {
        self.registered_models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn busy_ports(mut self, ports: &[u16]) -> Self {
        self.busy_ports = ports.to_vec();
        self
    }

    /// The OS refuses to spawn this role's program
    pub fn spawn_fails_for(mut self, role: StackRole) -> Self {
        self.failing_role = Some(role);
        self
    }

    pub fn with_sweeper(mut self, sweeper: MockProcessSweeper) -> Self {
        self.sweeper = Some(sweeper);
        self
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    pub fn build(self) -> TestOrchestrator {
        let launcher = self.launcher();
        let health = self.health();
        let ports = self.port_probe();
        let sweeper = self.sweeper.unwrap_or_else(|| {
            let mut sweeper = MockProcessSweeper::new();
            sweeper.expect_kill_matching().returning(|_, _| 0).times(0..);
            sweeper.expect_kill_processes_on_port().returning(|_, _| 0).times(0..);
            sweeper
        });
        StackOrchestrator::new(self.config, launcher, health, ports, sweeper)
    }

    fn launcher(&self) -> MockProcessLauncher {
        let launches = self.recorder.launches.clone();
        let terminated = self.recorder.terminated.clone();
        let failing_role = self.failing_role;
        let mut launcher = MockProcessLauncher::new();
        launcher.expect_launch().times(0..).returning(move |spec| {
            if Some(spec.role) == failing_role {
                return Err(OrchestratorError::spawn(spec.role, "No such file or directory"));
            }
            let mut launched = launches.lock().unwrap();
            launched.push(spec.clone());
            let pid = 1000 + launched.len() as u32;
            Ok(Box::new(TestHelpers::well_behaved_handle(spec.role, pid, terminated.clone()))
                as Box<dyn ProcessHandle>)
        });
        launcher
    }

    fn health(&self) -> MockHealthProbe {
        let probes = self.recorder.coordinator_probes.clone();
        let ready_after = self.coordinator_ready_after;
        let gateway_ready = self.gateway_ready;
        let models = self.registered_models.clone();

        let mut health = MockHealthProbe::new();
        health.expect_check().times(0..).returning(move |url, _| {
            if url.ends_with("/list_models") {
                let attempt = probes.fetch_add(1, Ordering::SeqCst);
                ready_after.is_some_and(|failures| attempt >= failures)
            } else if url.ends_with("/v1/models") {
                gateway_ready
            } else {
                false
            }
        });
        health
            .expect_list_models()
            .times(0..)
            .returning(move |_, _| Ok(models.clone()));
        health
    }

    fn port_probe(&self) -> MockPortProbe {
        let busy = self.busy_ports.clone();
        let mut probe = MockPortProbe::new();
        probe
            .expect_is_port_free()
            .times(0..)
            .returning(move |_, port| !busy.contains(&port));
        probe
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for common test patterns
pub struct TestHelpers;

impl TestHelpers {
    /// Handle that exits promptly on terminate and notes the role it stopped
    pub fn well_behaved_handle(
        role: StackRole,
        pid: u32,
        terminated: Arc<Mutex<Vec<StackRole>>>,
    ) -> MockProcessHandle {
        let mut handle = MockProcessHandle::new();
        handle.expect_pid().return_const(Some(pid));
        handle.expect_terminate().returning(move || {
            terminated.lock().unwrap().push(role);
            Ok(())
        });
        handle.expect_kill().returning(|| Ok(()));
        handle.expect_wait().returning(|| Ok(Some(0)));
        handle.expect_is_running().return_const(true);
        handle
    }

    /// `port` lies in `[base, base + window)`
    pub fn assert_port_in_window(port: u16, base: u16) {
        assert!(
            port >= base && port < base + TestFixtures::PORT_WINDOW,
            "port {port} outside [{base}, {})",
            base + TestFixtures::PORT_WINDOW
        );
    }

    /// Value following `flag` in a launch's argument list
    pub fn arg_after<'a>(spec: &'a LaunchSpec, flag: &str) -> Option<&'a str> {
        spec.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| spec.args.get(i + 1))
            .map(String::as_str)
    }
}
