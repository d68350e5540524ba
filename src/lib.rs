//! Load-balancing core for an HTTP intercepting proxy.
//!
//! Tracks named clusters of backend nodes, their health and load, optional
//! session affinity, and per-node outcome statistics. The surrounding proxy
//! dispatches each request through [`Balancer`] → [`Cluster`] → [`Node`]
//! (select a node, mark dispatch, record the outcome), while administrative
//! callers flip node health and a background sweeper expires idle sessions.
//!
//! All operations are in-memory, synchronous, and safe under concurrent
//! request dispatch; the only async piece is the session sweep task.

pub mod balancer;
pub mod config;
pub mod observability;

pub use balancer::cluster::{Cluster, DEFAULT_CLUSTER};
pub use balancer::node::{Node, NodeKey, NodeStatus};
pub use balancer::registry::Balancer;
pub use balancer::session::Session;
pub use balancer::stats::{Outcome, StatisticCollector, NO_RESPONSE};
pub use balancer::BalancerError;
