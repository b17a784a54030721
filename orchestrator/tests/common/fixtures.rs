//! Test fixtures and data for orchestrator tests
//!
//! Consistent model names, ports and configurations used across suites.

use orchestrator::config::{RoleTopology, StackConfig};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Model names as a caller would pass them
    pub const DEMO_MODEL: &'static str = "demo-model";
    pub const HUB_MODEL: &'static str = "lmsys/vicuna-7b-v1.5";
    /// What a worker serving `HUB_MODEL` registers as
    pub const HUB_MODEL_NAME: &'static str = "vicuna-7b-v1.5";

    /// Default role base ports
    pub const COORDINATOR_BASE: u16 = 21001;
    pub const WORKER_BASE: u16 = 21002;
    pub const GATEWAY_BASE: u16 = 8000;

    /// Scan budget every started role must fall within
    pub const PORT_WINDOW: u16 = 100;

    pub const OWNER_TAG: &'static str = "orchestrator-tests";

    /// Default policies, no cleanup sweep. Meant for paused-clock tests,
    /// where the 30 s poll and 10 s grace period cost nothing.
    pub fn config() -> StackConfig {
        StackConfig::default()
            .without_cleanup()
            .with_owner_tag(Self::OWNER_TAG)
    }

    /// Same as `config` but with the cleanup sweep left on
    pub fn config_with_cleanup() -> StackConfig {
        StackConfig::default().with_owner_tag(Self::OWNER_TAG)
    }

    pub fn topology() -> RoleTopology {
        RoleTopology::default()
    }
}
