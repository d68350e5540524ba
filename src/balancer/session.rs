//! Session affinity records.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::balancer::node::Node;

/// A client session pinned to a specific node.
///
/// Holds a shared reference, not ownership: node lifecycle is managed by the
/// cluster, and removing a node invalidates the sessions pinned to it.
#[derive(Debug, Clone)]
pub struct Session {
    node: Arc<Node>,
    last_used: Instant,
}

impl Session {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            last_used: Instant::now(),
        }
    }

    /// The node this session is pinned to.
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Refresh the last-access timestamp.
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// How long this session has been idle.
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_refreshes_idle_time() {
        let mut s = Session::new(Arc::new(Node::new("h", 80)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(s.idle_for() >= Duration::from_millis(20));

        s.touch();
        assert!(s.idle_for() < Duration::from_millis(20));
    }
}
