//! Stack configuration
//!
//! Layered from lowest to highest precedence: built-in defaults, an optional
//! JSON file, environment variables (a `.env` file is loaded first if present),
//! then whatever the binary's command line overrides.

use serde::{Deserialize, Serialize};
use shared::{SharedError, StackRole};
use std::path::Path;
use std::time::Duration;

use crate::error::OrchestratorResult;

pub const ENV_HOST: &str = "STACK_HOST";
pub const ENV_PYTHON: &str = "STACK_PYTHON";
pub const ENV_COORDINATOR_PORT: &str = "STACK_COORDINATOR_PORT";
pub const ENV_WORKER_PORT: &str = "STACK_WORKER_PORT";
pub const ENV_GATEWAY_PORT: &str = "STACK_GATEWAY_PORT";
pub const ENV_STARTUP_TIMEOUT_SECS: &str = "STACK_STARTUP_TIMEOUT_SECS";
pub const ENV_WORKER_GRACE_SECS: &str = "STACK_WORKER_GRACE_SECS";
pub const ENV_OWNER_TAG: &str = "STACK_OWNER_TAG";

/// Environment variable carrying the owner tag into every launched child
pub const OWNER_ENV_KEY: &str = "LLM_STACK_OWNER";
/// Environment variable carrying the launching orchestrator's instance id
pub const INSTANCE_ENV_KEY: &str = "LLM_STACK_INSTANCE";

/// Durations are written as integer milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Base port per role; every role scans upward from its base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleTopology {
    pub coordinator_port: u16,
    pub worker_port: u16,
    pub gateway_port: u16,
}

impl RoleTopology {
    pub fn base_port(&self, role: StackRole) -> u16 {
        match role {
            StackRole::Coordinator => self.coordinator_port,
            StackRole::Worker(_) => self.worker_port,
            StackRole::Gateway => self.gateway_port,
        }
    }
}

impl Default for RoleTopology {
    fn default() -> Self {
        Self {
            coordinator_port: 21001,
            worker_port: 21002,
            gateway_port: 8000,
        }
    }
}

/// Program plus leading arguments; role flags are appended at launch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchCommands {
    pub coordinator: CommandTemplate,
    pub worker: CommandTemplate,
    pub gateway: CommandTemplate,
}

impl LaunchCommands {
    /// FastChat modules run through the given Python interpreter
    pub fn python(python: &str) -> Self {
        Self {
            coordinator: CommandTemplate::new(python, &["-m", "fastchat.serve.controller"]),
            worker: CommandTemplate::new(python, &["-m", "fastchat.serve.model_worker"]),
            gateway: CommandTemplate::new(python, &["-m", "fastchat.serve.openai_api_server"]),
        }
    }

    /// One binary exposing `coordinator`, `worker` and `gateway` subcommands
    pub fn subcommands(program: &str) -> Self {
        Self {
            coordinator: CommandTemplate::new(program, &["coordinator"]),
            worker: CommandTemplate::new(program, &["worker"]),
            gateway: CommandTemplate::new(program, &["gateway"]),
        }
    }

    pub fn for_role(&self, role: StackRole) -> &CommandTemplate {
        match role {
            StackRole::Coordinator => &self.coordinator,
            StackRole::Worker(_) => &self.worker,
            StackRole::Gateway => &self.gateway,
        }
    }
}

impl Default for LaunchCommands {
    fn default() -> Self {
        Self::python("python3")
    }
}

/// Readiness polling for coordinator and gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    #[serde(with = "duration_ms")]
    pub interval: Duration,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(2),
        }
    }
}

/// How long to wait for a worker to show up in the coordinator's model list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationPolicy {
    #[serde(with = "duration_ms")]
    pub grace: Duration,
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    /// Extra checks after the first one fails
    pub retries: u32,
    #[serde(with = "duration_ms")]
    pub retry_interval: Duration,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            retries: 0,
            retry_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownPolicy {
    /// Wait after the graceful signal before escalating to a forced kill
    #[serde(with = "duration_ms")]
    pub graceful_timeout: Duration,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(5),
        }
    }
}

/// Best-effort sweep of stale stack processes before startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupPolicy {
    pub enabled: bool,
    /// Substring every stack command line contains
    pub program_marker: String,
    /// A command line must contain one of these as well as the marker
    pub role_keywords: Vec<String>,
    /// Number of worker ports above the worker base that are cleared
    pub worker_port_span: u16,
    #[serde(default)]
    pub extra_ports: Vec<u16>,
    #[serde(with = "duration_ms")]
    pub kill_wait: Duration,
    #[serde(with = "duration_ms")]
    pub settle: Duration,
}

impl CleanupPolicy {
    /// Well-known ports cleared before startup, in scan order without duplicates
    pub fn ports_to_clear(&self, topology: &RoleTopology) -> Vec<u16> {
        let worker_ports =
            (0..self.worker_port_span).filter_map(|offset| topology.worker_port.checked_add(offset));
        let mut ports: Vec<u16> = Vec::new();
        for port in [topology.coordinator_port, topology.gateway_port]
            .into_iter()
            .chain(worker_ports)
            .chain(self.extra_ports.iter().copied())
        {
            if !ports.contains(&port) {
                ports.push(port);
            }
        }
        ports
    }
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            program_marker: "fastchat".to_string(),
            role_keywords: vec![
                "controller".to_string(),
                "model_worker".to_string(),
                "openai_api_server".to_string(),
            ],
            worker_port_span: 8,
            extra_ports: Vec::new(),
            kill_wait: Duration::from_secs(5),
            settle: Duration::from_secs(2),
        }
    }
}

/// Complete orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub host: String,
    pub topology: RoleTopology,
    pub commands: LaunchCommands,
    pub port_scan_attempts: u16,
    #[serde(with = "duration_ms")]
    pub port_probe_timeout: Duration,
    pub health: PollPolicy,
    pub registration: RegistrationPolicy,
    pub shutdown: ShutdownPolicy,
    pub cleanup: CleanupPolicy,
    pub owner_tag: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            topology: RoleTopology::default(),
            commands: LaunchCommands::default(),
            port_scan_attempts: 100,
            port_probe_timeout: Duration::from_secs(1),
            health: PollPolicy::default(),
            registration: RegistrationPolicy::default(),
            shutdown: ShutdownPolicy::default(),
            cleanup: CleanupPolicy::default(),
            owner_tag: "llm-stack".to_string(),
        }
    }
}

impl StackConfig {
    /// Defaults overridden by the environment (`.env` is loaded if present)
    pub fn from_env() -> OrchestratorResult<Self> {
        let _ = dotenv::dotenv();
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Read a JSON file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> OrchestratorResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: StackConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `STACK_*` environment overrides on top of the current values
    pub fn apply_env(&mut self) -> OrchestratorResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> OrchestratorResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(python) = lookup(ENV_PYTHON) {
            self.commands = LaunchCommands::python(&python);
        }
        if let Some(port) = lookup(ENV_COORDINATOR_PORT) {
            self.topology.coordinator_port = parse_env(ENV_COORDINATOR_PORT, &port)?;
        }
        if let Some(port) = lookup(ENV_WORKER_PORT) {
            self.topology.worker_port = parse_env(ENV_WORKER_PORT, &port)?;
        }
        if let Some(port) = lookup(ENV_GATEWAY_PORT) {
            self.topology.gateway_port = parse_env(ENV_GATEWAY_PORT, &port)?;
        }
        if let Some(secs) = lookup(ENV_STARTUP_TIMEOUT_SECS) {
            self.health.timeout = Duration::from_secs(parse_env(ENV_STARTUP_TIMEOUT_SECS, &secs)?);
        }
        if let Some(secs) = lookup(ENV_WORKER_GRACE_SECS) {
            self.registration.grace = Duration::from_secs(parse_env(ENV_WORKER_GRACE_SECS, &secs)?);
        }
        if let Some(tag) = lookup(ENV_OWNER_TAG) {
            self.owner_tag = tag;
        }
        self.validate()
    }

    /// Reject values the orchestrator cannot work with
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.host.trim().is_empty() {
            return Err(SharedError::InvalidConfig {
                field: "host".to_string(),
                value: self.host.clone(),
            }
            .into());
        }
        if self.port_scan_attempts == 0 {
            return Err(SharedError::InvalidConfig {
                field: "port_scan_attempts".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.health.interval.is_zero() {
            return Err(SharedError::InvalidConfig {
                field: "health.interval".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.owner_tag.is_empty() {
            return Err(SharedError::InvalidConfig {
                field: "owner_tag".to_string(),
                value: String::new(),
            }
            .into());
        }
        Ok(())
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_topology(mut self, topology: RoleTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_commands(mut self, commands: LaunchCommands) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_port_scan_attempts(mut self, attempts: u16) -> Self {
        self.port_scan_attempts = attempts;
        self
    }

    pub fn with_health_policy(mut self, health: PollPolicy) -> Self {
        self.health = health;
        self
    }

    pub fn with_registration_policy(mut self, registration: RegistrationPolicy) -> Self {
        self.registration = registration;
        self
    }

    pub fn with_shutdown_policy(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_cleanup_policy(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn without_cleanup(mut self) -> Self {
        self.cleanup.enabled = false;
        self
    }

    pub fn with_owner_tag(mut self, tag: impl Into<String>) -> Self {
        self.owner_tag = tag.into();
        self
    }

    /// `http://<host>:<port>`
    pub fn base_url(&self, port: u16) -> String {
        format!("http://{}:{}", self.host, port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> OrchestratorResult<T> {
    value.trim().parse::<T>().map_err(|_| {
        SharedError::InvalidConfig {
            field: key.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_match_fastchat_layout() {
        let config = StackConfig::default();
        assert_eq!(config.topology.base_port(StackRole::Coordinator), 21001);
        assert_eq!(config.topology.base_port(StackRole::Worker(4)), 21002);
        assert_eq!(config.topology.base_port(StackRole::Gateway), 8000);
        assert_eq!(config.commands.worker.args, vec!["-m", "fastchat.serve.model_worker"]);
        assert_eq!(config.port_scan_attempts, 100);
        assert_eq!(config.registration.grace, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ports_to_clear_matches_sweep_range() {
        let config = StackConfig::default();
        let ports = config.cleanup.ports_to_clear(&config.topology);
        assert_eq!(ports[..2], [21001, 8000]);
        assert_eq!(ports[2..], (21002..21010).collect::<Vec<u16>>()[..]);
    }

    #[test]
    fn test_ports_to_clear_deduplicates_extras() {
        let mut config = StackConfig::default();
        config.cleanup.extra_ports = vec![8000, 9999];
        let ports = config.cleanup.ports_to_clear(&config.topology);
        assert_eq!(ports.iter().filter(|p| **p == 8000).count(), 1);
        assert_eq!(ports.last(), Some(&9999));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_HOST, "127.0.0.1"),
            (ENV_GATEWAY_PORT, "8001"),
            (ENV_WORKER_GRACE_SECS, "3"),
            (ENV_PYTHON, "/opt/venv/bin/python"),
        ]);
        let mut config = StackConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.topology.gateway_port, 8001);
        assert_eq!(config.registration.grace, Duration::from_secs(3));
        assert_eq!(config.commands.coordinator.program, "/opt/venv/bin/python");
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = StackConfig::default();
        let result = config.apply_overrides(|key| (key == ENV_COORDINATOR_PORT).then(|| "not-a-port".to_string()));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains(ENV_COORDINATOR_PORT));
    }

    #[test]
    fn test_from_file_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"host": "127.0.0.1", "topology": {{"gateway_port": 9100}}, "health": {{"interval": 250, "timeout": 5000, "request_timeout": 500}}}}"#
        )
        .unwrap();

        let config = StackConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.topology.gateway_port, 9100);
        assert_eq!(config.topology.coordinator_port, 21001);
        assert_eq!(config.health.interval, Duration::from_millis(250));
        assert_eq!(config.cleanup, CleanupPolicy::default());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = StackConfig::default().with_port_scan_attempts(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_subcommand_launch_commands() {
        let commands = LaunchCommands::subcommands("/bin/mockstack");
        assert_eq!(commands.for_role(StackRole::Gateway).args, vec!["gateway"]);
        assert_eq!(commands.for_role(StackRole::Worker(2)).program, "/bin/mockstack");
    }

    #[test]
    fn test_base_url() {
        let config = StackConfig::default();
        assert_eq!(config.base_url(8000), "http://localhost:8000");
    }
}
