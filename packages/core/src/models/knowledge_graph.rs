//! Knowledge graph exchange shape
//!
//! Input of graph generation and output of search projection. Never persisted
//! as such; node ids inside a generated graph are local to that graph.

use crate::models::node::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KgNode {
    pub id: NodeId,
    pub label: String,
    #[serde(default)]
    pub attributes: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KgEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub label: String,
    #[serde(default)]
    pub attributes: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub nodes: Vec<KgNode>,
    #[serde(default)]
    pub edges: Vec<KgEdge>,
}

impl KnowledgeGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Edges whose source or target is not one of this graph's nodes
    pub fn dangling_edges(&self) -> Vec<&KgEdge> {
        self.edges
            .iter()
            .filter(|edge| {
                !self.nodes.iter().any(|n| n.id == edge.source)
                    || !self.nodes.iter().any(|n| n.id == edge.target)
            })
            .collect()
    }
}
