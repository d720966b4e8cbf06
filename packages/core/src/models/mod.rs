//! Data Models
//!
//! - [`Node`] / [`NodeId`] - labeled entities with JSON attributes
//! - [`Edge`] - labeled, directed relationships between nodes
//! - [`KnowledgeGraph`] - exchange shape for generation and search projection
//! - Outcome, search and traversal types returned by graph operations

mod edge;
mod knowledge_graph;
mod node;
mod search;

pub use edge::{Edge, StoredEdge};
pub use knowledge_graph::{KgEdge, KgNode, KnowledgeGraph};
pub use node::{Attributes, Node, NodeId, StoredNode};
pub(crate) use node::{stored_payload, ID_KEY};
pub use search::{
    ConnectOutcome, Direction, InsertOutcome, MergeReport, SearchMatch, StepMarker,
    TraversalOptions, TraversalStep, UpsertOutcome,
};
