//! Edge Data Structures

use crate::models::node::{Attributes, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A labeled, directed relationship between two existing nodes
///
/// Two edges are identical when source, target, label and attributes all match;
/// the store never holds two identical edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub label: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Edge {
    pub fn new(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        label: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
            attributes,
        }
    }

    /// Composite payload the edge's vector is computed from
    pub fn embedding_payload(&self) -> Value {
        json!({
            "source_id": self.source.to_json(),
            "target_id": self.target.to_json(),
            "label": self.label,
            "attributes": self.attributes,
        })
    }
}

/// An edge together with its embedding slot
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEdge {
    pub embed_id: i64,
    pub edge: Edge,
}
