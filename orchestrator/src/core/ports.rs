//! Port allocation
//!
//! `PortPool` records which ports this orchestrator has handed out, in
//! allocation order. `scan_for_free_port` walks upward from a base port and
//! never returns a port that is either claimed in the pool or answered a connect.

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::PortProbe;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortPool {
    ports: Vec<u16>,
}

impl PortPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `port` as allocated; false if it already was
    pub fn claim(&mut self, port: u16) -> bool {
        if self.ports.contains(&port) {
            return false;
        }
        self.ports.push(port);
        true
    }

    /// Drop `port` from the pool; false if it was not claimed
    pub fn release(&mut self, port: u16) -> bool {
        match self.ports.iter().position(|p| *p == port) {
            Some(index) => {
                self.ports.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }

    /// Claimed ports in allocation order
    pub fn as_slice(&self) -> &[u16] {
        &self.ports
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn clear(&mut self) {
        self.ports.clear();
    }
}

/// First port in `start..start+max_attempts` (capped at 65535) that is not in
/// `claimed` and has no listener on `host`
pub async fn scan_for_free_port<P>(
    probe: &P,
    host: &str,
    start: u16,
    max_attempts: u16,
    claimed: &PortPool,
) -> OrchestratorResult<u16>
where
    P: PortProbe + ?Sized,
{
    let end = (u32::from(start) + u32::from(max_attempts)).min(u32::from(u16::MAX) + 1);
    for candidate in u32::from(start)..end {
        let port = candidate as u16;
        if claimed.contains(port) {
            continue;
        }
        if probe.is_port_free(host, port).await {
            return Ok(port);
        }
    }
    Err(OrchestratorError::NoFreePort {
        start,
        attempts: max_attempts,
    })
}
