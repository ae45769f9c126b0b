//! Swarm node listing

use serde::{Deserialize, Serialize};

/// Node state as reported by `docker node ls`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Node is unknown
    #[default]
    Unknown,
    /// Node is down
    Down,
    /// Node is ready
    Ready,
    /// Node is disconnected
    Disconnected,
}

impl NodeState {
    /// Parse the status column, case-insensitively
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "ready" => NodeState::Ready,
            "down" => NodeState::Down,
            "disconnected" => NodeState::Disconnected,
            _ => NodeState::Unknown,
        }
    }
}

/// Swarm node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Node hostname
    pub hostname: String,
    /// Node state
    pub state: NodeState,
}

impl Node {
    /// Check if node is ready
    pub fn is_ready(&self) -> bool {
        self.state == NodeState::Ready
    }
}

/// One line of `docker node ls --format '{{json .}}'`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NodeRow {
    pub hostname: String,
    #[serde(default)]
    pub status: String,
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        Self {
            hostname: row.hostname,
            state: NodeState::parse(&row.status),
        }
    }
}
