//! Backend node abstraction.
//!
//! # Responsibilities
//! - Represent a single backend endpoint (host, port)
//! - Track health status (Up/Down/TakeOut), in-flight and lifetime counters
//! - Accumulate per-status-code statistics for routing decisions
//!
//! # Design Decisions
//! - Identity is (host, port) only; status and counters never enter equality,
//!   so lookups work against freshly constructed keys
//! - All mutable state sits behind one mutex: derived metrics read a
//!   consistent snapshot of counter + in-flight + statistics
//! - Transition to Down zeroes the in-flight count; in-flight tracking is a
//!   no-op unless the node is Up

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::balancer::stats::{Outcome, StatisticCollector};
use crate::observability::metrics;

/// Health status of a backend node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Receives traffic.
    Up,
    /// Excluded from routing; eligible for auto-recovery.
    Down,
    /// Administratively removed from rotation; never auto-recovered.
    TakeOut,
}

/// Value key identifying a node by endpoint, independent of its state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub host: String,
    pub port: u16,
}

impl NodeKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug)]
struct NodeState {
    status: NodeStatus,
    counter: u64,
    threads: u32,
    last_up: Option<Instant>,
    down_since: Option<Instant>,
    status_codes: HashMap<u16, StatisticCollector>,
}

/// A single backend node.
#[derive(Debug)]
pub struct Node {
    host: String,
    port: u16,
    state: Mutex<NodeState>,
}

impl Node {
    /// Create a new node in Down state; `node_up` brings it into rotation.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            state: Mutex::new(NodeState {
                status: NodeStatus::Down,
                counter: 0,
                threads: 0,
                last_up: None,
                down_since: None,
                status_codes: HashMap::new(),
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The lookup key for this node.
    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.host.clone(), self.port)
    }

    /// Whether this node is the endpoint the key names.
    pub fn matches(&self, key: &NodeKey) -> bool {
        self.host == key.host && self.port == key.port
    }

    pub fn status(&self) -> NodeStatus {
        self.state.lock().unwrap().status
    }

    pub fn is_up(&self) -> bool {
        self.status() == NodeStatus::Up
    }

    pub fn is_down(&self) -> bool {
        self.status() == NodeStatus::Down
    }

    pub fn is_take_out(&self) -> bool {
        self.status() == NodeStatus::TakeOut
    }

    /// Transition health status. Any state is reachable from any other.
    ///
    /// Going Down abandons accounting for requests that can no longer
    /// complete against this node: the in-flight count is zeroed.
    pub fn set_status(&self, status: NodeStatus) {
        let mut state = self.state.lock().unwrap();
        match status {
            NodeStatus::Up => {
                state.last_up = Some(Instant::now());
                state.down_since = None;
            }
            NodeStatus::Down => {
                state.threads = 0;
                state.down_since = Some(Instant::now());
            }
            NodeStatus::TakeOut => {}
        }
        state.status = status;
    }

    /// Timestamp of the last transition to Up.
    pub fn last_up(&self) -> Option<Instant> {
        self.state.lock().unwrap().last_up
    }

    /// How long this node has been Down, if it is.
    pub fn down_for(&self) -> Option<Duration> {
        let state = self.state.lock().unwrap();
        match state.status {
            NodeStatus::Down => state.down_since.map(|t| t.elapsed()),
            _ => None,
        }
    }

    /// Register a request dispatched to this node. No-op unless Up.
    pub fn add_thread(&self) {
        let mut state = self.state.lock().unwrap();
        if state.status == NodeStatus::Up {
            state.threads += 1;
        }
    }

    /// Register a request completed against this node. No-op unless Up.
    pub fn remove_thread(&self) {
        let mut state = self.state.lock().unwrap();
        if state.status == NodeStatus::Up {
            state.threads = state.threads.saturating_sub(1);
        }
    }

    /// Current in-flight request count.
    pub fn threads(&self) -> u32 {
        self.state.lock().unwrap().threads
    }

    /// Increment the lifetime request counter; once per dispatched request.
    pub fn inc_counter(&self) {
        self.state.lock().unwrap().counter += 1;
        metrics::record_request_dispatched(&format!("{}:{}", self.host, self.port));
    }

    /// Lifetime request counter.
    pub fn counter(&self) -> u64 {
        self.state.lock().unwrap().counter
    }

    /// Reset the lifetime counter and discard all per-code collectors.
    pub fn clear_counter(&self) {
        let mut state = self.state.lock().unwrap();
        state.counter = 0;
        state.status_codes.clear();
    }

    /// Record an outcome against this node's per-status-code collector.
    pub fn collect_statistics_from(&self, outcome: &Outcome) {
        let mut state = self.state.lock().unwrap();
        state
            .status_codes
            .entry(outcome.bucket())
            .or_default()
            .collect_from(outcome);
    }

    /// Requests dispatched but neither completed nor currently in flight.
    ///
    /// Computed as lifetime counter minus recorded outcomes minus in-flight
    /// count, over one consistent snapshot. Transiently negative while an
    /// outcome is recorded before its in-flight slot is released.
    pub fn get_lost(&self) -> i64 {
        let state = self.state.lock().unwrap();
        let received: u64 = state.status_codes.values().map(|sc| sc.count()).sum();
        state.counter as i64 - received as i64 - state.threads as i64
    }

    /// Error ratio over all recorded outcomes; 0.0 when nothing was recorded.
    ///
    /// Success is a status code in (0, 500); the no-response bucket and 5xx
    /// count as errors.
    pub fn get_errors(&self) -> f64 {
        let state = self.state.lock().unwrap();
        let mut successes: u64 = 0;
        let mut all: u64 = 0;
        for (code, sc) in &state.status_codes {
            all += sc.count();
            if *code > 0 && *code < 500 {
                successes += sc.count();
            }
        }
        if all == 0 {
            0.0
        } else {
            1.0 - successes as f64 / all as f64
        }
    }

    /// Snapshot of the per-status-code statistics, for dashboards.
    pub fn statistics_by_status_code(&self) -> HashMap<u16, StatisticCollector> {
        self.state.lock().unwrap().status_codes.clone()
    }

    /// The URL requests to this node are rewritten to.
    pub fn destination_url(&self, request_uri: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, request_uri)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.host, self.port)
    }
}
