// ── Collaboration graph ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeType {
    Agent,
    Task,
    Tool,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeStatus {
    Idle,
    Working,
    Active,
    Completed,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EdgeType {
    Delegates,
    Calls,
    Returns,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

/// An agent, task, or tool in the collaboration graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollaborationNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub status: NodeStatus,
    /// Unix milliseconds of the last status change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A directed interaction between two nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollaborationEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Payload of the `collaboration` channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollaborationFlow {
    pub nodes: Vec<CollaborationNode>,
    pub edges: Vec<CollaborationEdge>,
    /// Node ids along the currently executing path.
    pub active_path: Vec<String>,
    /// Unix milliseconds.
    pub last_update: i64,
}

impl CollaborationFlow {
    pub fn node(&self, id: &str) -> Option<&CollaborationNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes currently doing work.
    pub fn busy_nodes(&self) -> impl Iterator<Item = &CollaborationNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.status, NodeStatus::Working | NodeStatus::Active))
    }

    /// Edges leaving `id`.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a CollaborationEdge> {
        self.edges.iter().filter(move |e| e.source == id)
    }
}
