//! Load-balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline → registry.rs (resolve cluster by name)
//!     → cluster.rs (auto-recovery pass, filter available nodes)
//!     → external selection policy picks a node
//!     → node.rs (add_thread / inc_counter around dispatch)
//!     → stats.rs (record the outcome per status code)
//! Admin commands → registry.rs → cluster.rs (up/down/takeout/remove)
//! sweeper.rs runs independently, touching only session maps
//! ```
//!
//! # Design Decisions
//! - Node selection policy lives outside this core; clusters only filter
//! - Health is inferred from routing outcomes and admin commands, no probes
//! - Each node is its own unit of mutual exclusion; cluster maps are
//!   independently guarded; no transaction spans more than one cluster

use thiserror::Error;

pub mod cluster;
pub mod node;
pub mod registry;
pub mod session;
pub mod stats;
pub mod sweeper;

/// Errors surfaced by balancer operations.
///
/// Lookup misses with a backward-compatible fallback (unknown cluster names)
/// are resolved silently by auto-creation and never reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalancerError {
    /// Down/takeout addressed an endpoint the cluster has never seen.
    #[error("node {host}:{port} not found in cluster {cluster}")]
    NodeNotFound {
        cluster: String,
        host: String,
        port: u16,
    },
}
