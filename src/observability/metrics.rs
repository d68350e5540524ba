//! Metrics recorders.
//!
//! Emits through the `metrics` facade; installing an exporter is the
//! embedding proxy's concern.

use metrics::{counter, gauge};

/// Record whether a node currently takes traffic (1 = up, 0 = not).
pub fn record_node_health(cluster: &str, node: &str, up: bool) {
    gauge!(
        "balancer_node_up",
        "cluster" => cluster.to_string(),
        "node" => node.to_string()
    )
    .set(if up { 1.0 } else { 0.0 });
}

/// Record one request dispatched to a node.
pub fn record_request_dispatched(node: &str) {
    counter!("balancer_requests_total", "node" => node.to_string()).increment(1);
}

/// Record sessions evicted by one sweep tick.
pub fn record_sessions_evicted(count: u64) {
    counter!("balancer_sessions_evicted_total").increment(count);
}
