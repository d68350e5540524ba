//! Cluster registry and administrative entry point.
//!
//! # Responsibilities
//! - Own the named clusters and resolve them for the request pipeline
//! - Route administrative commands (up/down/takeout, removal) to clusters
//! - Manage the session sweeper lifecycle via the session-timeout setting
//!
//! # Design Decisions
//! - Unknown cluster names are auto-created on access (backward
//!   compatibility); get-or-create goes through the map's atomic entry API,
//!   so concurrent lookups for the same name observe one instance
//! - The sweeper is stopped explicitly through `shutdown`, never from a
//!   destructor

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::balancer::cluster::{Cluster, DEFAULT_CLUSTER};
use crate::balancer::node::{Node, NodeKey};
use crate::balancer::session::Session;
use crate::balancer::sweeper::{SessionSweeper, DEFAULT_SWEEP_INTERVAL};
use crate::balancer::BalancerError;

/// Registry of named clusters; the load-balancing core's front door.
#[derive(Debug)]
pub struct Balancer {
    name: Mutex<String>,
    clusters: Arc<DashMap<String, Arc<Cluster>>>,
    /// Auto-recovery window in milliseconds; 0 disables passive retry.
    timeout_ms: AtomicU64,
    /// Sweep poll interval in milliseconds, applied when a sweeper spawns.
    sweep_interval_ms: AtomicU64,
    sweeper: Mutex<Option<SessionSweeper>>,
}

impl Balancer {
    /// Create a balancer with the "Default" cluster present and no sweeper
    /// running (session timeout 0).
    pub fn new() -> Self {
        let clusters = Arc::new(DashMap::new());
        clusters.insert(
            DEFAULT_CLUSTER.to_string(),
            Arc::new(Cluster::new(DEFAULT_CLUSTER)),
        );
        Self {
            name: Mutex::new(DEFAULT_CLUSTER.to_string()),
            clusters,
            timeout_ms: AtomicU64::new(0),
            sweep_interval_ms: AtomicU64::new(DEFAULT_SWEEP_INTERVAL.as_millis() as u64),
            sweeper: Mutex::new(None),
        }
    }

    pub fn name(&self) -> String {
        self.name.lock().unwrap().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock().unwrap() = name.into();
    }

    /// Register a cluster; idempotent. Returns whether it was created.
    pub fn add_cluster(&self, name: &str) -> bool {
        match self.clusters.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                tracing::debug!(cluster = %name, balancer = %self.name(), "adding cluster");
                v.insert(Arc::new(Cluster::new(name)));
                true
            }
        }
    }

    /// Resolve a cluster, creating it if the name is unknown.
    ///
    /// The entry API makes the check-then-create atomic: two concurrent
    /// callers for the same unknown name observe one Cluster instance.
    fn get_or_create_cluster(&self, name: &str) -> Arc<Cluster> {
        self.clusters
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(cluster = %name, "auto-creating cluster on access");
                Arc::new(Cluster::new(name))
            })
            .value()
            .clone()
    }

    /// Snapshot of all clusters, for topology dumps and dashboards.
    pub fn clusters(&self) -> Vec<Arc<Cluster>> {
        self.clusters.iter().map(|e| e.value().clone()).collect()
    }

    /// Bring a node into rotation, creating node and cluster as needed.
    pub fn up(&self, cluster: &str, host: &str, port: u16) {
        self.get_or_create_cluster(cluster)
            .node_up(NodeKey::new(host, port));
    }

    /// Mark a known node Down.
    pub fn down(&self, cluster: &str, host: &str, port: u16) -> Result<(), BalancerError> {
        self.get_or_create_cluster(cluster)
            .node_down(&NodeKey::new(host, port))
    }

    /// Take a known node out of rotation administratively.
    pub fn takeout(&self, cluster: &str, host: &str, port: u16) -> Result<(), BalancerError> {
        self.get_or_create_cluster(cluster)
            .node_take_out(&NodeKey::new(host, port))
    }

    /// Remove a node and its pinned sessions; returns whether it existed.
    pub fn remove_node(&self, cluster: &str, host: &str, port: u16) -> bool {
        self.get_or_create_cluster(cluster)
            .remove_node(&NodeKey::new(host, port))
    }

    pub fn get_node(&self, cluster: &str, host: &str, port: u16) -> Option<Arc<Node>> {
        self.get_or_create_cluster(cluster)
            .get_node(&NodeKey::new(host, port))
    }

    /// Every node of the cluster, after the auto-recovery pass.
    pub fn get_all_nodes_by_cluster(&self, cluster: &str) -> Vec<Arc<Node>> {
        self.get_or_create_cluster(cluster)
            .get_all_nodes(self.timeout())
    }

    /// The candidate set a selection policy chooses from.
    pub fn get_available_nodes_by_cluster(&self, cluster: &str) -> Vec<Arc<Node>> {
        self.get_or_create_cluster(cluster)
            .get_available_nodes(self.timeout())
    }

    /// Pin a session to a node within the named cluster.
    pub fn add_session_to_cluster(&self, session_id: &str, cluster: &str, node: Arc<Node>) {
        self.get_or_create_cluster(cluster)
            .add_session(session_id, node);
    }

    /// Refresh a session's last-access timestamp; false if it is unknown.
    pub fn touch_session(&self, session_id: &str, cluster: &str) -> bool {
        self.get_or_create_cluster(cluster).touch_session(session_id)
    }

    pub fn get_sessions(&self, cluster: &str) -> HashMap<String, Session> {
        self.get_or_create_cluster(cluster).get_sessions()
    }

    pub fn get_sessions_by_node(&self, cluster: &str, host: &str, port: u16) -> Vec<Session> {
        self.get_or_create_cluster(cluster)
            .get_sessions_by_node(&NodeKey::new(host, port))
    }

    /// The auto-recovery window; zero means disabled.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    /// The configured session timeout; zero when no sweeper is running.
    pub fn session_timeout(&self) -> Duration {
        self.sweeper
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.session_timeout())
            .unwrap_or(Duration::ZERO)
    }

    /// Configure session expiry.
    ///
    /// Zero stops the sweep task; a positive value starts one if none is
    /// running, otherwise retargets the running task for its next tick.
    /// Must be called from within a tokio runtime when starting a sweeper.
    pub fn set_session_timeout(&self, timeout: Duration) {
        let mut guard = self.sweeper.lock().unwrap();
        if timeout.is_zero() {
            if let Some(sweeper) = guard.take() {
                sweeper.stop();
            }
        } else {
            match guard.as_ref() {
                Some(sweeper) => sweeper.set_session_timeout(timeout),
                None => {
                    let interval =
                        Duration::from_millis(self.sweep_interval_ms.load(Ordering::Relaxed));
                    *guard = Some(SessionSweeper::spawn(
                        self.clusters.clone(),
                        timeout,
                        interval,
                    ));
                }
            }
        }
    }

    /// Adjust the sweep poll interval used when the next sweeper spawns.
    pub fn set_sweep_interval(&self, interval: Duration) {
        self.sweep_interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
    }

    /// Stop the sweep task. Owners call this on teardown; nothing is torn
    /// down implicitly.
    pub fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().unwrap().take() {
            sweeper.stop();
        }
    }
}

impl Default for Balancer {
    fn default() -> Self {
        Self::new()
    }
}
