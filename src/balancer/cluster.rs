//! Cluster management.
//!
//! # Responsibilities
//! - Group nodes under a name and resolve membership by (host, port)
//! - Filter nodes by health for the selection policy, applying the passive
//!   auto-recovery window to Down nodes
//! - Manage session affinity and cascade invalidation on node removal
//!
//! # Design Decisions
//! - Node map and session map are independently guarded concurrent maps
//! - List-returning operations hand out snapshots, never live views

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::balancer::node::{Node, NodeKey, NodeStatus};
use crate::balancer::session::Session;
use crate::balancer::BalancerError;
use crate::observability::metrics;

/// Name of the cluster that is always present.
pub const DEFAULT_CLUSTER: &str = "Default";

/// A named group of backend nodes sharing session-affinity state.
#[derive(Debug)]
pub struct Cluster {
    name: String,
    nodes: DashMap<NodeKey, Arc<Node>>,
    sessions: DashMap<String, Session>,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bring a node into rotation, creating it if this endpoint is unknown.
    ///
    /// Stamps the last-up timestamp used by the auto-recovery window.
    pub fn node_up(&self, key: NodeKey) {
        let node = self
            .nodes
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::debug!(cluster = %self.name, node = %key, "registering node");
                Arc::new(Node::new(key.host.clone(), key.port))
            })
            .value()
            .clone();
        node.set_status(NodeStatus::Up);
        tracing::info!(cluster = %self.name, node = %node, "node up");
        metrics::record_node_health(&self.name, &key.to_string(), true);
    }

    /// Mark a known node Down. Unknown endpoints are reported, not created:
    /// a node must be known before it can be marked unavailable.
    pub fn node_down(&self, key: &NodeKey) -> Result<(), BalancerError> {
        let node = self.lookup(key)?;
        node.set_status(NodeStatus::Down);
        tracing::warn!(cluster = %self.name, node = %node, "node down");
        metrics::record_node_health(&self.name, &key.to_string(), false);
        Ok(())
    }

    /// Take a known node out of rotation administratively.
    pub fn node_take_out(&self, key: &NodeKey) -> Result<(), BalancerError> {
        let node = self.lookup(key)?;
        node.set_status(NodeStatus::TakeOut);
        tracing::info!(cluster = %self.name, node = %node, "node taken out");
        metrics::record_node_health(&self.name, &key.to_string(), false);
        Ok(())
    }

    /// Remove a node entirely, together with all sessions pinned to it,
    /// regardless of its current status.
    pub fn remove_node(&self, key: &NodeKey) -> bool {
        let removed = self.nodes.remove(key).is_some();
        if removed {
            self.sessions.retain(|_, s| !s.node().matches(key));
            tracing::info!(cluster = %self.name, node = %key, "node removed");
        }
        removed
    }

    /// Look up a node by endpoint.
    pub fn get_node(&self, key: &NodeKey) -> Option<Arc<Node>> {
        self.nodes.get(key).map(|n| n.value().clone())
    }

    fn lookup(&self, key: &NodeKey) -> Result<Arc<Node>, BalancerError> {
        self.get_node(key).ok_or_else(|| BalancerError::NodeNotFound {
            cluster: self.name.clone(),
            host: key.host.clone(),
            port: key.port,
        })
    }

    /// Snapshot of every known node, after the auto-recovery pass.
    pub fn get_all_nodes(&self, timeout: Duration) -> Vec<Arc<Node>> {
        self.check_node_timeouts(timeout);
        self.nodes.iter().map(|e| e.value().clone()).collect()
    }

    /// Snapshot of the nodes a selection policy may route to: status Up,
    /// after the auto-recovery pass.
    pub fn get_available_nodes(&self, timeout: Duration) -> Vec<Arc<Node>> {
        self.check_node_timeouts(timeout);
        self.nodes
            .iter()
            .filter(|e| e.value().is_up())
            .map(|e| e.value().clone())
            .collect()
    }

    /// Passive retry: promote Down nodes back to Up once they have been Down
    /// longer than the window. Zero disables; TakeOut is never promoted.
    fn check_node_timeouts(&self, timeout: Duration) {
        if timeout.is_zero() {
            return;
        }
        for entry in self.nodes.iter() {
            let node = entry.value();
            if node.down_for().is_some_and(|d| d >= timeout) {
                node.set_status(NodeStatus::Up);
                tracing::info!(cluster = %self.name, node = %node, "node auto-recovered");
                metrics::record_node_health(&self.name, &entry.key().to_string(), true);
            }
        }
    }

    /// Pin a session to a node, creating or overwriting the entry and
    /// refreshing its last-access timestamp.
    pub fn add_session(&self, session_id: &str, node: Arc<Node>) {
        self.sessions
            .insert(session_id.to_string(), Session::new(node));
    }

    /// Refresh a live session's last-access timestamp on reuse.
    ///
    /// Returns false when the session id is unknown (or was already
    /// evicted): the caller treats the request as unaffinitized.
    pub fn touch_session(&self, session_id: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.touch();
                true
            }
            None => false,
        }
    }

    /// Snapshot of the session-id to session mapping.
    pub fn get_sessions(&self) -> HashMap<String, Session> {
        self.sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// All sessions currently pinned to the given node.
    pub fn get_sessions_by_node(&self, key: &NodeKey) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|e| e.value().node().matches(key))
            .map(|e| e.value().clone())
            .collect()
    }

    /// Evict sessions idle at least `timeout`; returns the eviction count.
    pub(crate) fn sweep_sessions(&self, timeout: Duration) -> u64 {
        let mut evicted = 0;
        self.sessions.retain(|id, session| {
            if session.idle_for() >= timeout {
                tracing::debug!(cluster = %self.name, session = %id, "session expired");
                evicted += 1;
                false
            } else {
                true
            }
        });
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(port: u16) -> NodeKey {
        NodeKey::new("h", port)
    }

    #[test]
    fn test_node_up_is_get_or_create() {
        let c = Cluster::new("c");
        c.node_up(key(80));
        c.node_up(key(80));
        assert_eq!(c.get_all_nodes(Duration::ZERO).len(), 1);
        assert!(c.get_node(&key(80)).unwrap().is_up());
    }

    #[test]
    fn test_down_on_unknown_node_is_reported() {
        let c = Cluster::new("c");
        assert!(matches!(
            c.node_down(&key(80)),
            Err(BalancerError::NodeNotFound { .. })
        ));
        assert!(c.get_all_nodes(Duration::ZERO).is_empty());
    }

    #[test]
    fn test_available_filters_by_status() {
        let c = Cluster::new("c");
        c.node_up(key(80));
        c.node_up(key(81));
        c.node_up(key(82));
        c.node_down(&key(81)).unwrap();
        c.node_take_out(&key(82)).unwrap();

        let available = c.get_available_nodes(Duration::ZERO);
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].port(), 80);
        assert_eq!(c.get_all_nodes(Duration::ZERO).len(), 3);
    }

    #[test]
    fn test_auto_recovery_window() {
        let c = Cluster::new("c");
        c.node_up(key(80));
        c.node_up(key(81));
        c.node_down(&key(80)).unwrap();
        c.node_take_out(&key(81)).unwrap();

        let window = Duration::from_millis(50);
        assert!(c.get_available_nodes(window).is_empty());

        std::thread::sleep(Duration::from_millis(70));

        // Down node re-enters rotation; TakeOut never does.
        let available = c.get_available_nodes(window);
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].port(), 80);
        assert!(available[0].is_up());
        assert!(c.get_node(&key(81)).unwrap().is_take_out());
    }

    #[test]
    fn test_zero_window_disables_auto_recovery() {
        let c = Cluster::new("c");
        c.node_up(key(80));
        c.node_down(&key(80)).unwrap();

        std::thread::sleep(Duration::from_millis(30));
        assert!(c.get_available_nodes(Duration::ZERO).is_empty());
    }

    #[test]
    fn test_remove_node_cascades_sessions() {
        let c = Cluster::new("c");
        c.node_up(key(80));
        c.node_up(key(81));
        let a = c.get_node(&key(80)).unwrap();
        let b = c.get_node(&key(81)).unwrap();
        c.add_session("sid1", a.clone());
        c.add_session("sid2", b);

        assert!(c.remove_node(&key(80)));
        assert!(c.get_sessions_by_node(&key(80)).is_empty());
        assert!(c.get_node(&key(80)).is_none());
        assert!(c.get_sessions().contains_key("sid2"));
        assert!(!c.get_sessions().contains_key("sid1"));
    }

    #[test]
    fn test_add_session_overwrites_pin() {
        let c = Cluster::new("c");
        c.node_up(key(80));
        c.node_up(key(81));
        let a = c.get_node(&key(80)).unwrap();
        let b = c.get_node(&key(81)).unwrap();

        c.add_session("sid", a);
        c.add_session("sid", b);

        let sessions = c.get_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions["sid"].node().port(), 81);
    }

    #[test]
    fn test_touched_session_survives_the_sweep() {
        let c = Cluster::new("c");
        c.node_up(key(80));
        let n = c.get_node(&key(80)).unwrap();
        c.add_session("sid", n);

        std::thread::sleep(Duration::from_millis(40));
        assert!(c.touch_session("sid"));
        assert!(!c.touch_session("ghost"));

        assert_eq!(c.sweep_sessions(Duration::from_millis(30)), 0);
        assert!(c.get_sessions().contains_key("sid"));
    }

    #[test]
    fn test_sweep_only_evicts_idle_sessions() {
        let c = Cluster::new("c");
        c.node_up(key(80));
        let n = c.get_node(&key(80)).unwrap();
        c.add_session("old", n.clone());
        std::thread::sleep(Duration::from_millis(40));
        c.add_session("fresh", n);

        let evicted = c.sweep_sessions(Duration::from_millis(30));
        assert_eq!(evicted, 1);
        let sessions = c.get_sessions();
        assert!(sessions.contains_key("fresh"));
        assert!(!sessions.contains_key("old"));
    }
}
