//! Topology loading and dumping.
//!
//! # Responsibilities
//! - Read and validate the persisted topology at startup
//! - Replay it into a balancer as one cluster-add + node-up per declaration
//! - Dump the current topology, nodes presumed available
//!
//! # Design Decisions
//! - Malformed topology is fatal at load time, never silently defaulted;
//!   the only documented fallback is the port-80 default
//! - Validation collects all errors, not just the first

use std::path::Path;

use thiserror::Error;

use crate::balancer::registry::Balancer;
use crate::config::schema::{ClusterConfig, NodeConfig, TopologyConfig};

/// Error type for topology loading and dumping.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single semantic problem in a declared topology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cluster {index}: name must not be empty")]
    EmptyClusterName { index: usize },

    #[error("cluster {cluster:?}: duplicate cluster name")]
    DuplicateClusterName { cluster: String },

    #[error("cluster {cluster:?}, node {index}: host must not be empty")]
    EmptyHost { cluster: String, index: usize },

    #[error("cluster {cluster:?}, node {index}: port must not be 0")]
    ZeroPort { cluster: String, index: usize },
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate a topology from a TOML file.
pub fn load_topology(path: &Path) -> Result<TopologyConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_topology(&content)
}

/// Parse and validate a topology from TOML text.
pub fn parse_topology(content: &str) -> Result<TopologyConfig, ConfigError> {
    let config: TopologyConfig = toml::from_str(content)?;
    validate_topology(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Semantic validation; serde handles the syntactic part.
pub fn validate_topology(config: &TopologyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (i, cluster) in config.clusters.iter().enumerate() {
        if cluster.name.is_empty() {
            errors.push(ValidationError::EmptyClusterName { index: i });
        } else if !seen.insert(cluster.name.as_str()) {
            errors.push(ValidationError::DuplicateClusterName {
                cluster: cluster.name.clone(),
            });
        }
        for (j, node) in cluster.nodes.iter().enumerate() {
            if node.host.is_empty() {
                errors.push(ValidationError::EmptyHost {
                    cluster: cluster.name.clone(),
                    index: j,
                });
            }
            if node.port == 0 {
                errors.push(ValidationError::ZeroPort {
                    cluster: cluster.name.clone(),
                    index: j,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Replay a loaded topology into the balancer.
pub fn apply_topology(config: &TopologyConfig, balancer: &Balancer) {
    for cluster in &config.clusters {
        balancer.add_cluster(&cluster.name);
        for node in &cluster.nodes {
            balancer.up(&cluster.name, &node.host, node.port);
        }
    }
    tracing::info!(clusters = config.clusters.len(), "topology applied");
}

/// Snapshot the balancer's current topology.
///
/// Dumped with the auto-recovery pass disabled and without health or
/// statistics: a written topology always declares its nodes available.
pub fn topology_of(balancer: &Balancer) -> TopologyConfig {
    let mut clusters: Vec<ClusterConfig> = balancer
        .clusters()
        .iter()
        .map(|cluster| {
            let mut nodes: Vec<NodeConfig> = cluster
                .get_all_nodes(std::time::Duration::ZERO)
                .iter()
                .map(|n| NodeConfig {
                    host: n.host().to_string(),
                    port: n.port(),
                })
                .collect();
            nodes.sort_by(|a, b| (&a.host, a.port).cmp(&(&b.host, b.port)));
            ClusterConfig {
                name: cluster.name().to_string(),
                nodes,
            }
        })
        .collect();
    clusters.sort_by(|a, b| a.name.cmp(&b.name));
    TopologyConfig { clusters }
}

/// Dump the balancer's current topology as TOML text.
pub fn dump_topology(balancer: &Balancer) -> Result<String, ConfigError> {
    Ok(toml::to_string(&topology_of(balancer))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_default_port() {
        let config = parse_topology(
            r#"
            [[clusters]]
            name = "web"

            [[clusters.nodes]]
            host = "a.example"

            [[clusters.nodes]]
            host = "b.example"
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.clusters.len(), 1);
        assert_eq!(config.clusters[0].nodes[0].port, 80);
        assert_eq!(config.clusters[0].nodes[1].port, 8080);
    }

    #[test]
    fn test_missing_host_is_fatal() {
        let err = parse_topology(
            r#"
            [[clusters]]
            name = "web"

            [[clusters.nodes]]
            port = 8080
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_bad_port_is_fatal() {
        let err = parse_topology(
            r#"
            [[clusters]]
            name = "web"

            [[clusters.nodes]]
            host = "a.example"
            port = 99999
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let err = parse_topology(
            r#"
            [[clusters]]
            name = ""

            [[clusters.nodes]]
            host = ""
            port = 0
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors.len(), 3);
                assert!(errors.contains(&ValidationError::EmptyClusterName { index: 0 }));
            }
            other => panic!("expected validation failure, got {other}"),
        }
    }

    #[test]
    fn test_apply_and_dump_round_trip() {
        let config = parse_topology(
            r#"
            [[clusters]]
            name = "web"

            [[clusters.nodes]]
            host = "a.example"
            port = 8080
            "#,
        )
        .unwrap();

        let balancer = Balancer::new();
        apply_topology(&config, &balancer);

        let node = balancer.get_node("web", "a.example", 8080).unwrap();
        assert!(node.is_up());

        let dumped = topology_of(&balancer);
        // "Default" always exists; "web" carries the declared node.
        let web = dumped.clusters.iter().find(|c| c.name == "web").unwrap();
        assert_eq!(web.nodes.len(), 1);
        assert_eq!(web.nodes[0].host, "a.example");
        assert_eq!(web.nodes[0].port, 8080);

        let text = dump_topology(&balancer).unwrap();
        assert!(text.contains("a.example"));
    }
}
