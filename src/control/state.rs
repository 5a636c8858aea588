/// Shared control-plane state: five collections, each guarded by its own
/// lock so unrelated endpoints never contend (single-writer discipline
/// per collection).
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::config::NetworkMode;
use crate::run::{Registration, TestResult};
use crate::topology::{self, Role};

#[derive(Clone)]
pub struct ControlState {
    inner: Arc<Inner>,
}

struct Inner {
    cp_id: String,
    network_mode: NetworkMode,
    instances: Mutex<Vec<Registration>>,
    running: Mutex<HashSet<String>>,
    results: Mutex<Vec<TestResult>>,
    config: RwLock<Option<serde_json::Value>>,
    matched: AtomicBool,
    pairing: RwLock<Pairing>,
}

/// Parallel arrays of length N (pairing enabled) or N,0 (disabled), built
/// once when `/test/match` latches MATCHED.
#[derive(Debug, Clone, Default)]
pub struct Pairing {
    pub servers: Vec<Registration>,
    pub clients: Vec<Registration>,
}

impl ControlState {
    pub fn new(cp_id: impl Into<String>, network_mode: NetworkMode) -> Self {
        Self {
            inner: Arc::new(Inner {
                cp_id: cp_id.into(),
                network_mode,
                instances: Mutex::new(Vec::new()),
                running: Mutex::new(HashSet::new()),
                results: Mutex::new(Vec::new()),
                config: RwLock::new(None),
                matched: AtomicBool::new(false),
                pairing: RwLock::new(Pairing::default()),
            }),
        }
    }

    pub async fn register(&self, registration: Registration) {
        let mut instances = self.inner.instances.lock().await;
        if !instances.iter().any(|r| r.hostname == registration.hostname) {
            instances.push(registration);
        }
    }

    pub async fn list_instances(&self) -> Vec<Registration> {
        self.inner.instances.lock().await.clone()
    }

    pub async fn set_config(&self, config: serde_json::Value) {
        *self.inner.config.write().await = Some(config);
    }

    pub async fn get_config(&self) -> Option<serde_json::Value> {
        self.inner.config.read().await.clone()
    }

    /// Idempotent compare-and-set: builds the pairing arrays the first time
    /// it is called, does nothing on subsequent calls.
    pub async fn seal_match(&self) {
        if self
            .inner
            .matched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let instances = self.list_instances().await;
            let mut servers: Vec<Registration> = instances
                .iter()
                .filter(|r| matches!(r.role, crate::run::WorkerRole::Server))
                .cloned()
                .collect();
            let mut clients: Vec<Registration> = instances
                .iter()
                .filter(|r| matches!(r.role, crate::run::WorkerRole::Client))
                .cloned()
                .collect();
            servers.sort_by_key(|r| self.parsed_index(&r.hostname));
            clients.sort_by_key(|r| self.parsed_index(&r.hostname));
            *self.inner.pairing.write().await = Pairing { servers, clients };
        }
    }

    pub fn is_matched(&self) -> bool {
        self.inner.matched.load(Ordering::SeqCst)
    }

    fn parsed_index(&self, hostname: &str) -> u32 {
        topology::parse_name(&self.inner.cp_id, &self.inner.network_mode, hostname)
            .map(|p| p.instance_index)
            .unwrap_or(u32::MAX)
    }

    /// `go` iff MATCHED and the hostname is not already running; inserting
    /// into RUNNING happens atomically with the check.
    pub async fn try_go(&self, hostname: &str) -> bool {
        if !self.is_matched() {
            return false;
        }
        let mut running = self.inner.running.lock().await;
        if running.contains(hostname) {
            false
        } else {
            running.insert(hostname.to_string());
            true
        }
    }

    /// Clears RUNNING and RESULTS, preserving INSTANCES and CONFIG, enabling
    /// a reuse-mode restart without re-staging.
    pub async fn reset_status(&self) {
        self.inner.running.lock().await.clear();
        self.inner.results.lock().await.clear();
    }

    pub async fn submit_result(&self, result: TestResult) {
        self.inner.results.lock().await.push(result);
    }

    pub async fn list_results(&self) -> Vec<TestResult> {
        self.inner.results.lock().await.clone()
    }

    /// `match_ip` enrichment for `/test/run`: loadbalancer lookup
    /// first, then pairing-index fallback; `None` means "no loadbalancer and
    /// pairing disabled" (no enrichment), `Err` means "pairing enabled but no
    /// peer exists" (caller should respond 404).
    pub async fn match_ip(
        &self,
        hostname: &str,
        loadbalancers: &crate::config::LoadBalancers,
        pairing_enabled: bool,
    ) -> Result<Option<String>, ()> {
        let Some(parsed) = topology::parse_name(&self.inner.cp_id, &self.inner.network_mode, hostname) else {
            return Ok(None);
        };

        let peer_list = match parsed.role {
            Role::Server => &loadbalancers.client,
            Role::Client => &loadbalancers.server,
            Role::Master => return Ok(None),
        };
        if let Some(addr) = peer_list.get((parsed.network_index.saturating_sub(1)) as usize) {
            return Ok(Some(addr.clone()));
        }

        if !pairing_enabled {
            return Ok(None);
        }

        let pairing = self.inner.pairing.read().await;
        let peer = match parsed.role {
            Role::Server => pairing.clients.get(parsed.instance_index as usize - 1),
            Role::Client => pairing.servers.get(parsed.instance_index as usize - 1),
            Role::Master => None,
        };

        match peer {
            Some(peer) => {
                let ip = if matches!(self.inner.network_mode, NetworkMode::Full) {
                    peer.external_ip.clone().unwrap_or_else(|| peer.internal_ip.clone())
                } else {
                    peer.internal_ip.clone()
                };
                Ok(Some(ip))
            }
            None => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::WorkerRole;

    fn reg(hostname: &str, role: WorkerRole) -> Registration {
        Registration {
            hostname: hostname.to_string(),
            internal_ip: format!("10.0.0.{}", hostname.len()),
            external_ip: Some(format!("203.0.113.{}", hostname.len())),
            role,
        }
    }

    #[tokio::test]
    async fn s4_status_gate_is_idempotent_until_reset() {
        let state = ControlState::new("1", NetworkMode::Full);
        state.seal_match().await;
        assert!(state.try_go("host-a").await);
        assert!(!state.try_go("host-a").await);
        state.reset_status().await;
        assert!(state.try_go("host-a").await);
    }

    #[tokio::test]
    async fn pairing_is_deterministic_regardless_of_arrival_order() {
        let state = ControlState::new("1", NetworkMode::Full);
        state
            .register(reg("cloudpunch-1-c-r1-n1-c1", WorkerRole::Client))
            .await;
        state
            .register(reg("cloudpunch-1-s-r1-n1-s1", WorkerRole::Server))
            .await;
        state.seal_match().await;

        let lb = crate::config::LoadBalancers::default();
        let ip = state
            .match_ip("cloudpunch-1-s-r1-n1-s1", &lb, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ip, "203.0.113.23");
    }

    #[tokio::test]
    async fn match_ip_404s_when_pairing_enabled_but_no_peer() {
        let state = ControlState::new("1", NetworkMode::Full);
        state
            .register(reg("cloudpunch-1-s-r1-n1-s1", WorkerRole::Server))
            .await;
        state.seal_match().await;

        let lb = crate::config::LoadBalancers::default();
        let result = state.match_ip("cloudpunch-1-s-r1-n1-s1", &lb, true).await;
        assert!(result.is_err());
    }
}
