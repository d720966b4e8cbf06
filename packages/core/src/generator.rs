//! Text-to-graph generation boundary
//!
//! Extraction of nodes and edges from free text happens outside this crate. A
//! [`GraphGenerator`] is injected into [`Graph`](crate::Graph) and only its
//! output shape, [`KnowledgeGraph`], is relied upon.

use crate::models::KnowledgeGraph;
use async_trait::async_trait;

/// Turns text into a candidate knowledge graph
///
/// Node ids in the result are local to the generated graph; edges refer to
/// them. [`Graph::insert_into_graph`](crate::Graph::insert_into_graph) replaces
/// them with persistent ids before storing.
#[async_trait]
pub trait GraphGenerator: Send + Sync {
    async fn generate(&self, text: &str) -> anyhow::Result<KnowledgeGraph>;
}
