//! Operation outcomes and search / traversal types

use crate::models::node::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of inserting a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { embed_id: i64 },
    /// A node with the same id already exists; nothing was written
    Skipped,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted { .. })
    }
}

/// Result of upserting a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted { embed_id: i64 },
    /// Existing node merged and re-embedded under a fresh slot
    Updated { embed_id: i64 },
}

/// Result of connecting two nodes
///
/// Duplicate edges and missing endpoints are not errors: nothing is written and
/// the reason is reported here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected { embed_id: i64 },
    DuplicateEdge,
    MissingEndpoint,
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectOutcome::Connected { .. })
    }
}

/// One vector search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchMatch {
    pub embed_id: i64,
    pub distance: f32,
}

/// Which edges a traversal follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Follow edges pointing at the current node
    Inbound,
    /// Follow edges leaving the current node
    Outbound,
    #[default]
    Both,
}

/// Shape of a traversal step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepMarker {
    /// `()` a node
    #[serde(rename = "()")]
    Node,
    /// `->` an edge followed from source to target
    #[serde(rename = "->")]
    Outbound,
    /// `<-` an edge followed from target to source
    #[serde(rename = "<-")]
    Inbound,
}

impl StepMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            StepMarker::Node => "()",
            StepMarker::Outbound => "->",
            StepMarker::Inbound => "<-",
        }
    }
}

/// One entry of a traversal path
///
/// Edge steps carry the id of the node they lead to and the edge attributes as
/// body. Bodies are only filled in when requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalStep {
    pub id: NodeId,
    pub marker: StepMarker,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl TraversalStep {
    pub fn is_node(&self) -> bool {
        self.marker == StepMarker::Node
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraversalOptions {
    /// Stop once this node is reached
    pub target: Option<NodeId>,
    pub direction: Direction,
    /// Include node bodies and edge steps in the path
    pub with_bodies: bool,
}

impl TraversalOptions {
    pub fn to(target: impl Into<NodeId>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_bodies(mut self) -> Self {
        self.with_bodies = true;
        self
    }
}

/// Summary of a similarity-merge pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub nodes_examined: usize,
    pub node_merges: usize,
    pub nodes_removed: usize,
    pub edges_examined: usize,
    pub edge_merges: usize,
    pub edges_removed: usize,
    /// Ids of the nodes created by node merges, in merge order
    pub merged_node_ids: Vec<NodeId>,
}

impl MergeReport {
    /// Merges committed so far
    pub fn merges(&self) -> usize {
        self.node_merges + self.edge_merges
    }
}
