//! Graph façade
//!
//! [`Graph`] composes the [`Database`], an injected [`EmbeddingProvider`] and an
//! optional [`GraphGenerator`] behind one API. Every write runs as one unit of
//! work through [`Database::atomic`]; reads use a fresh connection.
//!
//! # Examples
//!
//! ```rust,no_run
//! use personal_graph_core::{Graph, Node, Edge, TraversalOptions};
//! use personal_graph_core::db::Database;
//! use personal_graph_embeddings::HashingEmbedder;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> personal_graph_core::Result<()> {
//! let db = Database::open_local("/tmp/graph.db").await?;
//! let graph = Graph::new(db, Arc::new(HashingEmbedder::new(384)));
//!
//! let attrs = |v: serde_json::Value| v.as_object().cloned().unwrap_or_default();
//! graph.add_node(&Node::new("1", "Jack", attrs(json!({"age": 30})))).await?;
//! graph.add_node(&Node::new("2", "James", attrs(json!({"age": 25})))).await?;
//! graph.add_edge(&Edge::new("1", "2", "knows", attrs(json!({})))).await?;
//!
//! let path = graph.traverse(&"1".into(), &TraversalOptions::to("2")).await?;
//! assert_eq!(path.len(), 2);
//! # Ok(())
//! # }
//! ```

use crate::config::{GraphConfig, SearchConfig};
use crate::db::{Database, EntityTable};
use crate::generator::GraphGenerator;
use crate::models::{
    Attributes, ConnectOutcome, Edge, InsertOutcome, KgEdge, KgNode, KnowledgeGraph,
    MergeReport, Node, NodeId, TraversalOptions, TraversalStep, UpsertOutcome,
};
use crate::operations::error::{GraphError, Result};
use crate::operations::query_builder::{self, Query};
use crate::operations::{edge_ops, merge, node_ops, traversal, vector_search};
use libsql::Connection;
use personal_graph_embeddings::{build_provider, DistanceMetric, EmbeddingProvider};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Key that free text and generated attributes are stored under
pub const BODY_KEY: &str = "body";

#[derive(Clone)]
pub struct Graph {
    db: Database,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Option<Arc<dyn GraphGenerator>>,
    search: SearchConfig,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("db", &self.db)
            .field("embedder", &self.embedder.model_name())
            .field("generator", &self.generator.is_some())
            .field("search", &self.search)
            .finish()
    }
}

fn body_payload(text: &str) -> Value {
    json!({ BODY_KEY: text })
}

/// The `body` field when present, else the whole attribute object
fn body_of(attributes: &Attributes) -> Value {
    attributes
        .get(BODY_KEY)
        .cloned()
        .unwrap_or_else(|| Value::Object(attributes.clone()))
}

fn wrap_body(value: &Value) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(BODY_KEY.to_string(), value.clone());
    attributes
}

impl Graph {
    pub fn new(db: Database, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            db,
            embedder,
            generator: None,
            search: SearchConfig::default(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn GraphGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_search_config(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Open the configured database and build the configured provider
    pub async fn from_config(config: &GraphConfig) -> Result<Self> {
        config.validate()?;
        let embedder = build_provider(&config.embedding)?;
        let db = Database::open(config.database.connection_mode()?).await?;
        info!(location = %db.mode().describe(), model = embedder.model_name(), "Graph ready");
        Ok(Self::new(db, embedder).with_search_config(config.search.clone()))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Configured metric, or the provider's native one
    pub fn metric(&self) -> DistanceMetric {
        self.search
            .metric
            .unwrap_or_else(|| self.embedder.native_metric())
    }

    async fn read(&self) -> Result<Connection> {
        Ok(self.db.connect_with_timeout().await?)
    }

    fn generator(&self) -> Result<&Arc<dyn GraphGenerator>> {
        self.generator
            .as_ref()
            .ok_or_else(|| GraphError::config("No graph generator configured"))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn add_node(&self, node: &Node) -> Result<InsertOutcome> {
        let embedder = self.embedder.as_ref();
        self.db
            .atomic(|conn| async move { node_ops::insert_node(&conn, embedder, node).await })
            .await
    }

    pub async fn add_nodes(&self, nodes: &[Node]) -> Result<Vec<InsertOutcome>> {
        let embedder = self.embedder.as_ref();
        self.db
            .atomic(|conn| async move { node_ops::insert_nodes(&conn, embedder, nodes).await })
            .await
    }

    pub async fn add_edge(&self, edge: &Edge) -> Result<ConnectOutcome> {
        let embedder = self.embedder.as_ref();
        self.db
            .atomic(|conn| async move { edge_ops::connect_nodes(&conn, embedder, edge).await })
            .await
    }

    pub async fn add_edges(&self, edges: &[Edge]) -> Result<Vec<ConnectOutcome>> {
        let embedder = self.embedder.as_ref();
        self.db
            .atomic(|conn| async move { edge_ops::connect_many_nodes(&conn, embedder, edges).await })
            .await
    }

    /// Insert, or shallow-merge attributes into an existing node
    pub async fn update_node(&self, node: &Node) -> Result<UpsertOutcome> {
        let embedder = self.embedder.as_ref();
        self.db
            .atomic(|conn| async move { node_ops::upsert_node(&conn, embedder, node).await })
            .await
    }

    pub async fn update_nodes(&self, nodes: &[Node]) -> Result<Vec<UpsertOutcome>> {
        let embedder = self.embedder.as_ref();
        self.db
            .atomic(|conn| async move { node_ops::upsert_nodes(&conn, embedder, nodes).await })
            .await
    }

    pub async fn remove_node(&self, id: &NodeId) -> Result<bool> {
        self.db
            .atomic(|conn| async move { node_ops::remove_node(&conn, id).await })
            .await
    }

    pub async fn remove_nodes(&self, ids: &[NodeId]) -> Result<usize> {
        self.db
            .atomic(|conn| async move { node_ops::remove_nodes(&conn, ids).await })
            .await
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn search_node(&self, id: &NodeId) -> Result<Option<Node>> {
        node_ops::find_node(&self.read().await?, id).await
    }

    pub async fn search_node_label(&self, id: &NodeId) -> Result<Option<String>> {
        node_ops::find_node_label(&self.read().await?, id).await
    }

    pub async fn find_nodes(&self, query: &Query) -> Result<Vec<Node>> {
        query_builder::find_nodes(&self.read().await?, query).await
    }

    pub async fn find_node_ids(&self, query: &Query) -> Result<Vec<NodeId>> {
        query_builder::find_node_ids(&self.read().await?, query).await
    }

    pub async fn find_edges(&self, query: &Query) -> Result<Vec<Edge>> {
        query_builder::find_edges(&self.read().await?, query).await
    }

    /// Every node id, oldest first
    pub async fn fetch_ids_from_db(&self) -> Result<Vec<NodeId>> {
        node_ops::node_ids(&self.read().await?).await
    }

    pub async fn search_indegree_edges(&self, id: &NodeId) -> Result<Vec<Edge>> {
        edge_ops::inbound_edges(&self.read().await?, id).await
    }

    pub async fn search_outdegree_edges(&self, id: &NodeId) -> Result<Vec<Edge>> {
        edge_ops::outbound_edges(&self.read().await?, id).await
    }

    pub async fn connections(&self, id: &NodeId) -> Result<Vec<Edge>> {
        edge_ops::connections(&self.read().await?, id).await
    }

    pub async fn traverse(
        &self,
        source: &NodeId,
        options: &TraversalOptions,
    ) -> Result<Vec<TraversalStep>> {
        traversal::traverse(&self.read().await?, source, options).await
    }

    // =========================================================================
    // Similarity
    // =========================================================================

    async fn nearest_nodes(
        &self,
        conn: &Connection,
        payload: &Value,
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<(Node, f32)>> {
        let hits = vector_search::vector_search(
            conn,
            self.embedder.as_ref(),
            self.metric(),
            EntityTable::Nodes,
            payload,
            k,
            threshold,
        )
        .await?;

        let mut nodes = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(stored) = node_ops::node_by_embed_id(conn, hit.embed_id).await? {
                nodes.push((stored.node, hit.distance));
            }
        }
        Ok(nodes)
    }

    /// Nodes nearest to `payload`, closest first
    pub async fn vector_search_nodes(
        &self,
        payload: &Value,
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<(Node, f32)>> {
        let conn = self.read().await?;
        self.nearest_nodes(&conn, payload, k, threshold).await
    }

    /// Edges nearest to `payload`, closest first
    ///
    /// Edge vectors are computed from [`Edge::embedding_payload`], so queries
    /// should use the same shape.
    pub async fn vector_search_edges(
        &self,
        payload: &Value,
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<(Edge, f32)>> {
        let conn = self.read().await?;
        let hits = vector_search::vector_search(
            &conn,
            self.embedder.as_ref(),
            self.metric(),
            EntityTable::Edges,
            payload,
            k,
            threshold,
        )
        .await?;

        let mut edges = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(stored) = edge_ops::edge_by_embed_id(&conn, hit.embed_id).await? {
                edges.push((stored.edge, hit.distance));
            }
        }
        Ok(edges)
    }

    /// Collapse near-duplicate nodes and edges
    ///
    /// Merges commit one by one; see [`merge::merge_by_similarity`].
    pub async fn merge_by_similarity(&self, threshold: f32) -> Result<MergeReport> {
        merge::merge_by_similarity(&self.db, self.embedder.as_ref(), self.metric(), threshold)
            .await
    }

    /// Merge with the configured threshold
    pub async fn merge_duplicates(&self) -> Result<MergeReport> {
        self.merge_by_similarity(self.search.merge_threshold).await
    }

    /// Every node whose body is closer than `threshold` to `label`
    pub async fn find_nodes_like(&self, label: &str, threshold: f32) -> Result<Vec<Node>> {
        let conn = self.read().await?;
        let nodes = self
            .nearest_nodes(&conn, &body_payload(label), usize::MAX, Some(threshold))
            .await?;
        Ok(nodes.into_iter().map(|(node, _)| node).collect())
    }

    // =========================================================================
    // Text entry points
    // =========================================================================

    /// Store `text` as a new node and return its id
    ///
    /// The node is labeled with the text; its attributes are `attributes` with
    /// `body` set to the text.
    pub async fn insert(&self, text: &str, attributes: Attributes) -> Result<NodeId> {
        let mut attributes = attributes;
        attributes.insert(BODY_KEY.to_string(), Value::String(text.to_string()));
        let node = Node::new(NodeId::generate(), text, attributes);

        match self.add_node(&node).await? {
            InsertOutcome::Inserted { .. } => Ok(node.id),
            InsertOutcome::Skipped => Err(GraphError::corrupt_row(
                "nodes",
                format!("generated id {} already taken", node.id),
            )),
        }
    }

    /// Nodes nearest to `text`, closest first
    pub async fn search(&self, text: &str, limit: usize) -> Result<Vec<(Node, f32)>> {
        self.vector_search_nodes(&body_payload(text), limit, None)
            .await
    }

    /// [`Graph::search`] with the configured default limit
    pub async fn search_default(&self, text: &str) -> Result<Vec<(Node, f32)>> {
        self.search(text, self.search.default_limit).await
    }

    /// Whether no stored node lies within `threshold` of `text`
    pub async fn is_unique_prompt(&self, text: &str, threshold: f32) -> Result<bool> {
        let hits = self
            .vector_search_nodes(&body_payload(text), 1, Some(threshold))
            .await?;
        Ok(hits.is_empty())
    }

    /// Generate a graph from `text` and store it
    ///
    /// Generated ids are replaced by fresh persistent ids and attributes are
    /// stored under `body`. A generated edge pointing outside the generated
    /// nodes rejects the whole graph: nothing is written and an empty graph is
    /// returned. Everything else is written in one transaction.
    pub async fn insert_into_graph(&self, text: &str) -> Result<KnowledgeGraph> {
        let generated = self
            .generator()?
            .generate(text)
            .await
            .map_err(GraphError::Generation)?;

        let dangling = generated.dangling_edges().len();
        if dangling > 0 {
            warn!(dangling, "Generated graph has edges to unknown nodes, discarding");
            return Ok(KnowledgeGraph::default());
        }

        let mut id_map: HashMap<NodeId, NodeId> = HashMap::new();
        for node in &generated.nodes {
            id_map
                .entry(node.id.clone())
                .or_insert_with(NodeId::generate);
        }
        let persistent = |local: &NodeId| id_map.get(local).cloned().unwrap_or_else(|| local.clone());

        let stored = KnowledgeGraph {
            nodes: generated
                .nodes
                .iter()
                .map(|node| KgNode {
                    id: persistent(&node.id),
                    label: node.label.clone(),
                    attributes: node.attributes.clone(),
                })
                .collect(),
            edges: generated
                .edges
                .iter()
                .map(|edge| KgEdge {
                    source: persistent(&edge.source),
                    target: persistent(&edge.target),
                    label: edge.label.clone(),
                    attributes: edge.attributes.clone(),
                })
                .collect(),
        };

        let nodes: Vec<Node> = stored
            .nodes
            .iter()
            .map(|n| Node::new(n.id.clone(), n.label.clone(), wrap_body(&n.attributes)))
            .collect();
        let edges: Vec<Edge> = stored
            .edges
            .iter()
            .map(|e| {
                Edge::new(
                    e.source.clone(),
                    e.target.clone(),
                    e.label.clone(),
                    wrap_body(&e.attributes),
                )
            })
            .collect();

        let embedder = self.embedder.as_ref();
        let (nodes, edges) = (&nodes, &edges);
        self.db
            .atomic(|conn| async move {
                node_ops::insert_nodes(&conn, embedder, nodes).await?;
                edge_ops::connect_many_nodes(&conn, embedder, edges).await?;
                Ok::<_, GraphError>(())
            })
            .await?;

        info!(
            nodes = stored.nodes.len(),
            edges = stored.edges.len(),
            "Inserted generated graph"
        );
        Ok(stored)
    }

    /// The `limit` nodes nearest to `text`, their edges and the far endpoints
    pub async fn search_from_graph(&self, text: &str, limit: usize) -> Result<KnowledgeGraph> {
        let conn = self.read().await?;
        let hits = self
            .nearest_nodes(&conn, &body_payload(text), limit, None)
            .await?;

        let mut graph = KnowledgeGraph::default();
        let mut edges: Vec<Edge> = Vec::new();
        for (node, _) in &hits {
            for edge in edge_ops::connections(&conn, &node.id).await? {
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
        }

        let mut node_ids: Vec<NodeId> = hits.iter().map(|(node, _)| node.id.clone()).collect();
        for edge in &edges {
            for endpoint in [&edge.source, &edge.target] {
                if !node_ids.contains(endpoint) {
                    node_ids.push(endpoint.clone());
                }
            }
        }

        for id in &node_ids {
            if let Some(node) = node_ops::find_node(&conn, id).await? {
                graph.nodes.push(KgNode {
                    id: node.id,
                    label: node.label,
                    attributes: body_of(&node.attributes),
                });
            }
        }
        graph.edges = edges
            .into_iter()
            .map(|edge| KgEdge {
                attributes: body_of(&edge.attributes),
                source: edge.source,
                target: edge.target,
                label: edge.label,
            })
            .collect();

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_helpers() {
        let wrapped = wrap_body(&json!({"name": "Jack"}));
        assert_eq!(body_of(&wrapped), json!({"name": "Jack"}));

        let plain = json!({"name": "Jill"}).as_object().cloned().unwrap();
        assert_eq!(body_of(&plain), json!({"name": "Jill"}));
        assert_eq!(body_payload("hi"), json!({"body": "hi"}));
    }
}
