//! Observed cluster state
//!
//! The orchestrator takes a fresh snapshot before every operation and
//! decides what to create, scale or remove from it.

use super::node::{Node, NodeRow};
use crate::error::Result;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Existence of a service on the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// The cluster was not queried (dry run)
    Unknown,
    /// The service exists with the given desired replica count
    Exists {
        /// Desired replicas, when reported
        replicas: Option<u64>,
    },
    /// No service with that name
    Absent,
}

impl ServiceState {
    /// Whether the service is known to exist
    pub fn exists(&self) -> bool {
        matches!(self, ServiceState::Exists { .. })
    }
}

/// Snapshot of services, networks and volumes on the cluster
#[derive(Debug, Clone, Default)]
pub struct ClusterState {
    observed: bool,
    services: HashMap<String, Option<u64>>,
    networks: HashSet<String>,
    volumes: HashSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceRow {
    name: String,
    #[serde(default)]
    replicas: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NameRow {
    name: String,
}

impl ClusterState {
    /// State for a run that does not query the cluster
    pub fn unobserved() -> Self {
        Self::default()
    }

    /// Build a snapshot from `ls --format '{{json .}}'` outputs
    pub fn from_listings(services: &str, networks: &str, volumes: &str) -> Result<Self> {
        let services = json_lines::<ServiceRow>(services)?
            .into_iter()
            .map(|row| {
                let replicas = desired_replicas(&row.replicas);
                (row.name, replicas)
            })
            .collect();

        Ok(Self {
            observed: true,
            services,
            networks: names(networks)?,
            volumes: names(volumes)?,
        })
    }

    /// State of a service by its full (project-prefixed) name
    pub fn service(&self, name: &str) -> ServiceState {
        if !self.observed {
            return ServiceState::Unknown;
        }
        match self.services.get(name) {
            Some(replicas) => ServiceState::Exists {
                replicas: *replicas,
            },
            None => ServiceState::Absent,
        }
    }

    /// Whether a network with that full name exists
    pub fn has_network(&self, name: &str) -> bool {
        self.networks.contains(name)
    }

    /// Whether a volume with that full name exists
    pub fn has_volume(&self, name: &str) -> bool {
        self.volumes.contains(name)
    }
}

/// Parse `docker node ls --format '{{json .}}'`
pub fn parse_nodes(output: &str) -> Result<Vec<Node>> {
    Ok(json_lines::<NodeRow>(output)?
        .into_iter()
        .map(Node::from)
        .collect())
}

fn names(output: &str) -> Result<HashSet<String>> {
    Ok(json_lines::<NameRow>(output)?
        .into_iter()
        .map(|row| row.name)
        .collect())
}

fn json_lines<T: serde::de::DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

/// Desired count from a `running/desired` replicas column
fn desired_replicas(column: &str) -> Option<u64> {
    let counts = column.split_whitespace().next()?;
    let (_, desired) = counts.split_once('/')?;
    desired.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_listings() {
        let state = ClusterState::from_listings(
            concat!(
                r#"{"ID":"1","Name":"app_web","Mode":"replicated","Replicas":"2/3","Image":"nginx"}"#,
                "\n",
                r#"{"ID":"2","Name":"app_agent","Mode":"global","Replicas":"4/4 (max 1 per node)"}"#,
                "\n\n",
            ),
            r#"{"ID":"n","Name":"app_front","Driver":"overlay"}"#,
            "",
        )
        .unwrap();

        assert_eq!(
            state.service("app_web"),
            ServiceState::Exists { replicas: Some(3) }
        );
        assert_eq!(
            state.service("app_agent"),
            ServiceState::Exists { replicas: Some(4) }
        );
        assert_eq!(state.service("app_db"), ServiceState::Absent);
        assert!(state.has_network("app_front"));
        assert!(!state.has_volume("app_data"));
    }

    #[test]
    fn test_unobserved_is_unknown() {
        let state = ClusterState::unobserved();
        assert_eq!(state.service("anything"), ServiceState::Unknown);
        assert!(!state.service("anything").exists());
    }

    #[test]
    fn test_parse_nodes() {
        let nodes = parse_nodes(concat!(
            r#"{"Hostname":"manager-1","Status":"Ready","Availability":"Active"}"#,
            "\n",
            r#"{"Hostname":"worker-2","Status":"Down","Availability":"Active"}"#,
        ))
        .unwrap();
        let ready: Vec<_> = nodes
            .iter()
            .filter(|n| n.is_ready())
            .map(|n| n.hostname.as_str())
            .collect();
        assert_eq!(ready, vec!["manager-1"]);
    }

    #[test]
    fn test_malformed_listing_is_an_error() {
        assert!(ClusterState::from_listings("not json", "", "").is_err());
    }
}
