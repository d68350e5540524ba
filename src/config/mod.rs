//! Persisted topology configuration.

pub mod loader;
pub mod schema;

pub use loader::{apply_topology, dump_topology, load_topology, parse_topology, ConfigError};
pub use schema::{ClusterConfig, NodeConfig, TopologyConfig};
