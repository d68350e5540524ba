//! Persisted topology schema.
//!
//! The written form carries cluster names and node endpoints only; health
//! and statistics are never persisted, and loaded nodes are presumed
//! available.

use serde::{Deserialize, Serialize};

/// Root of the persisted topology.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TopologyConfig {
    /// Declared clusters.
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
}

/// One declared cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Unique cluster name.
    pub name: String,

    /// Node endpoints belonging to the cluster.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

/// One declared node endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Backend host; required.
    pub host: String,

    /// Backend port (default: 80).
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    80
}
