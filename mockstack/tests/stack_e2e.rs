//! End-to-end tests: the real orchestrator driving real `mockstack` processes
//!
//! Every test spawns OS processes and binds local ports, so they run one at
//! a time. Base ports come from the OS so parallel test binaries do not
//! collide.

use serial_test::serial;
use std::time::Duration;

use orchestrator::config::{
    CleanupPolicy, CommandTemplate, LaunchCommands, PollPolicy, RegistrationPolicy, RoleTopology, ShutdownPolicy,
    StackConfig, OWNER_ENV_KEY,
};
use orchestrator::core::wait_for_service;
use orchestrator::services::{HttpHealthProbe, TcpPortProbe};
use orchestrator::traits::{HealthProbe, PortProbe};
use orchestrator::{OrchestratorError, RealStackOrchestrator, StackWarning};
use shared::api::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use shared::StackRole;

const MOCKSTACK: &str = env!("CARGO_BIN_EXE_mockstack");
const MODEL: &str = "lmsys/vicuna-7b-v1.5";

fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn owner_tag(test: &str) -> String {
    format!("mockstack-e2e-{test}-{}", uuid::Uuid::new_v4().simple())
}

/// Short timeouts, OS-chosen base ports, no sweep
fn e2e_config(test: &str) -> StackConfig {
    StackConfig::default()
        .with_host("127.0.0.1")
        .with_topology(RoleTopology {
            coordinator_port: unused_port(),
            worker_port: unused_port(),
            gateway_port: unused_port(),
        })
        .with_commands(LaunchCommands::subcommands(MOCKSTACK))
        .with_health_policy(PollPolicy {
            interval: Duration::from_millis(100),
            timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(1),
        })
        .with_registration_policy(RegistrationPolicy {
            grace: Duration::from_millis(200),
            request_timeout: Duration::from_secs(2),
            retries: 30,
            retry_interval: Duration::from_millis(100),
        })
        .with_shutdown_policy(ShutdownPolicy {
            graceful_timeout: Duration::from_secs(5),
        })
        .with_owner_tag(owner_tag(test))
        .without_cleanup()
}

fn lsof_available() -> bool {
    std::process::Command::new("lsof")
        .arg("-v")
        .output()
        .is_ok()
}

#[tokio::test]
#[serial]
async fn test_full_stack_serves_chat_and_stops_cleanly() {
    let mut orchestrator = RealStackOrchestrator::from_config(e2e_config("full")).unwrap();

    let ports = orchestrator.start_full_stack(MODEL).await.unwrap();
    assert!(orchestrator.warnings().is_empty(), "{:?}", orchestrator.warnings());

    // Health probes keep succeeding after startup
    let probe = HttpHealthProbe::new().unwrap();
    for _ in 0..3 {
        assert!(
            probe
                .check(&format!("http://127.0.0.1:{}/list_models", ports.coordinator), Duration::from_secs(2))
                .await
        );
        assert!(orchestrator.is_gateway_alive().await);
    }

    let status = orchestrator.get_status().await;
    assert!(status.is_up());
    assert_eq!(status.workers, vec![ports.worker]);

    // OpenAI-style request through the gateway
    let base_url = orchestrator.gateway_base_url().unwrap();
    let request = ChatCompletionRequest {
        model: MODEL.to_string(),
        messages: vec![
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::user("Hello! Who are you?"),
        ],
        max_tokens: Some(100),
        temperature: Some(0.7),
    };
    let completion: ChatCompletionResponse = reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
        .post(format!("{base_url}/v1/chat/completions"))
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(completion.content().unwrap().starts_with("Hello!"));

    orchestrator.stop_all_servers().await;

    assert!(orchestrator.processes().is_empty());
    assert!(orchestrator.warnings().is_empty());
    let ports_probe = TcpPortProbe::default();
    for port in ports.all() {
        assert!(ports_probe.is_port_free("127.0.0.1", port).await, "port {port} still bound");
    }
}

#[tokio::test]
#[serial]
async fn test_coordinator_that_never_listens_fails_startup() {
    let mut config = e2e_config("idle");
    config.commands.coordinator = CommandTemplate::new(MOCKSTACK, &["idle"]);
    config.health.timeout = Duration::from_secs(1);
    let mut orchestrator = RealStackOrchestrator::from_config(config).unwrap();

    let result = orchestrator.start_full_stack(MODEL).await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Startup {
            role: StackRole::Coordinator,
            ..
        })
    ));
    assert!(orchestrator.processes().is_empty());
    assert!(orchestrator.claimed_ports().is_empty());
}

#[tokio::test]
#[serial]
async fn test_unregistered_worker_warns_but_starts() {
    let mut config = e2e_config("unregistered");
    config.commands.worker = CommandTemplate::new(MOCKSTACK, &["worker", "--skip-registration"]);
    config.registration.retries = 2;
    let mut orchestrator = RealStackOrchestrator::from_config(config).unwrap();

    let ports = orchestrator.start_full_stack(MODEL).await.unwrap();

    assert_eq!(
        orchestrator.warnings(),
        &[StackWarning::WorkerNotRegistered {
            role: StackRole::Worker(0),
            model: MODEL.to_string(),
            coordinator_port: ports.coordinator,
        }]
    );
    orchestrator.stop_all_servers().await;
    assert!(orchestrator.processes().is_empty());
}

#[tokio::test]
#[serial]
async fn test_stop_without_start_is_noop() {
    let mut orchestrator = RealStackOrchestrator::from_config(e2e_config("noop")).unwrap();
    orchestrator.stop_all_servers().await;
    assert!(orchestrator.processes().is_empty());
    assert!(orchestrator.warnings().is_empty());
}

/// A coordinator left behind by an earlier run with the same owner tag is
/// swept before startup
#[tokio::test]
#[serial]
async fn test_cleanup_sweeps_leftover_by_owner_tag() {
    let mut config = e2e_config("sweep");
    config.cleanup = CleanupPolicy {
        enabled: true,
        kill_wait: Duration::from_secs(5),
        settle: Duration::from_millis(100),
        ..CleanupPolicy::default()
    };
    let leftover_port = unused_port();
    let mut leftover = tokio::process::Command::new(MOCKSTACK)
        .args(["coordinator", "--host", "127.0.0.1", "--port", &leftover_port.to_string()])
        .env(OWNER_ENV_KEY, &config.owner_tag)
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let probe = HttpHealthProbe::new().unwrap();
    let url = format!("http://127.0.0.1:{leftover_port}/list_models");
    assert!(wait_for_service(&probe, &url, &config.health).await);

    let orchestrator = RealStackOrchestrator::from_config(config).unwrap();
    orchestrator.cleanup_existing_servers().await;

    let exit = tokio::time::timeout(Duration::from_secs(5), leftover.wait())
        .await
        .expect("leftover coordinator should have been killed")
        .unwrap();
    assert!(!exit.success());
    assert!(TcpPortProbe::default().is_port_free("127.0.0.1", leftover_port).await);
}

/// Whatever listens on a port is killed, if `lsof` is there to find it
#[tokio::test]
#[serial]
async fn test_kill_processes_on_port() {
    if !lsof_available() {
        eprintln!("lsof not available, skipping");
        return;
    }

    let config = e2e_config("port");
    let port = unused_port();
    let mut squatter = tokio::process::Command::new(MOCKSTACK)
        .args(["coordinator", "--host", "127.0.0.1", "--port", &port.to_string()])
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let probe = HttpHealthProbe::new().unwrap();
    let url = format!("http://127.0.0.1:{port}/list_models");
    assert!(wait_for_service(&probe, &url, &config.health).await);

    let orchestrator = RealStackOrchestrator::from_config(config).unwrap();
    assert_eq!(orchestrator.kill_processes_on_port(port).await, 1);

    tokio::time::timeout(Duration::from_secs(5), squatter.wait())
        .await
        .expect("squatter should have been killed")
        .unwrap();
    assert!(TcpPortProbe::default().is_port_free("127.0.0.1", port).await);
}
