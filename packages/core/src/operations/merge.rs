//! Similarity-merge pass
//!
//! Collapses near-duplicate nodes, then near-duplicate edges, into single
//! records.
//!
//! # Architecture
//!
//! Ids are snapshotted up front, oldest `embed_id` first. Each anchor that still
//! exists is searched against its own table with `k = 2`; when a second match
//! falls under the threshold the matched rows are folded into one new record
//! and the originals are removed. Records created by the pass are not revisited.
//!
//! Every merge runs in its own transaction. A failure stops the pass and
//! reports how many merges were already committed, those stay durable.
//!
//! Removing a merged node also removes its incident edges; the merged node
//! starts unconnected.

use crate::db::{Database, EntityTable};
use crate::models::{Attributes, ConnectOutcome, Edge, MergeReport, Node, NodeId, StoredEdge, StoredNode};
use crate::operations::edge_ops::{
    connect_nodes, edge_by_embed_id, edge_embed_ids, remove_edge_by_embed_id,
};
use crate::operations::error::{GraphError, Result};
use crate::operations::node_ops::{
    find_stored_node, insert_node, node_by_embed_id, node_ids, remove_node,
};
use crate::operations::vector_search::vector_search;
use libsql::Connection;
use personal_graph_embeddings::{DistanceMetric, EmbeddingProvider};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Neighbors fetched per anchor: the anchor itself plus its nearest duplicate
const MERGE_K: usize = 2;

const LABEL_SEPARATOR: &str = ",";

struct NodeMerge {
    merged_id: NodeId,
    removed: usize,
}

/// Labels of the merged rows, in match order
fn joined_label<'a>(labels: impl IntoIterator<Item = &'a str>) -> String {
    labels.into_iter().collect::<Vec<_>>().join(LABEL_SEPARATOR)
}

/// Bodies of the merged rows keyed by their former `embed_id`
fn keyed_bodies(bodies: impl IntoIterator<Item = (i64, Value)>) -> Attributes {
    bodies
        .into_iter()
        .map(|(embed_id, body)| (embed_id.to_string(), body))
        .collect()
}

async fn merge_node(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    metric: DistanceMetric,
    threshold: f32,
    anchor: &NodeId,
) -> Result<Option<NodeMerge>> {
    let Some(stored) = find_stored_node(conn, anchor).await? else {
        return Ok(None);
    };

    let payload = Value::Object(stored.node.stored_payload());
    let matches = vector_search(
        conn,
        embedder,
        metric,
        EntityTable::Nodes,
        &payload,
        MERGE_K,
        Some(threshold),
    )
    .await?;
    if matches.len() < 2 {
        return Ok(None);
    }

    let mut originals: Vec<StoredNode> = Vec::with_capacity(matches.len());
    for hit in &matches {
        match node_by_embed_id(conn, hit.embed_id).await? {
            Some(node) => originals.push(node),
            None => {
                return Err(GraphError::corrupt_row(
                    "nodes_embedding",
                    format!("embedding {} has no node row", hit.embed_id),
                ))
            }
        }
    }

    let label = joined_label(originals.iter().map(|s| s.node.label.as_str()));
    let attributes = keyed_bodies(
        originals
            .iter()
            .map(|s| (s.embed_id, Value::Object(s.node.stored_payload()))),
    );

    for original in &originals {
        remove_node(conn, &original.node.id).await?;
    }

    let merged = Node::new(NodeId::generate(), label, attributes);
    insert_node(conn, embedder, &merged).await?;

    debug!(anchor = %anchor, merged = %merged.id, count = originals.len(), "Merged nodes");
    Ok(Some(NodeMerge {
        merged_id: merged.id,
        removed: originals.len(),
    }))
}

async fn merge_edge(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    metric: DistanceMetric,
    threshold: f32,
    anchor_embed_id: i64,
) -> Result<Option<usize>> {
    let Some(anchor) = edge_by_embed_id(conn, anchor_embed_id).await? else {
        return Ok(None);
    };

    let matches = vector_search(
        conn,
        embedder,
        metric,
        EntityTable::Edges,
        &anchor.edge.embedding_payload(),
        MERGE_K,
        Some(threshold),
    )
    .await?;
    if matches.len() < 2 {
        return Ok(None);
    }

    let mut originals: Vec<StoredEdge> = Vec::with_capacity(matches.len());
    for hit in &matches {
        match edge_by_embed_id(conn, hit.embed_id).await? {
            Some(edge) => originals.push(edge),
            None => {
                return Err(GraphError::corrupt_row(
                    "edges_embedding",
                    format!("embedding {} has no edge row", hit.embed_id),
                ))
            }
        }
    }

    let label = joined_label(originals.iter().map(|s| s.edge.label.as_str()));
    let attributes = keyed_bodies(
        originals
            .iter()
            .map(|s| (s.embed_id, Value::Object(s.edge.attributes.clone()))),
    );

    for original in &originals {
        remove_edge_by_embed_id(conn, original.embed_id).await?;
    }

    let merged = Edge::new(
        anchor.edge.source.clone(),
        anchor.edge.target.clone(),
        label,
        attributes,
    );
    match connect_nodes(conn, embedder, &merged).await? {
        ConnectOutcome::Connected { embed_id } => {
            debug!(anchor = anchor_embed_id, embed_id, count = originals.len(), "Merged edges");
        }
        other => {
            warn!(anchor = anchor_embed_id, outcome = ?other, "Merged edge was not written");
        }
    }
    Ok(Some(originals.len()))
}

/// Run the merge pass over every node, then every edge
///
/// # Errors
///
/// Any failure is wrapped in [`GraphError::MergeInterrupted`] carrying the
/// number of merges committed before it.
pub async fn merge_by_similarity(
    db: &Database,
    embedder: &dyn EmbeddingProvider,
    metric: DistanceMetric,
    threshold: f32,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();

    let interrupted = |report: &MergeReport, source: GraphError| GraphError::MergeInterrupted {
        processed: report.merges(),
        source: Box::new(source),
    };

    let conn = db
        .connect_with_timeout()
        .await
        .map_err(|e| interrupted(&report, e.into()))?;
    let anchors = node_ids(&conn)
        .await
        .map_err(|e| interrupted(&report, e))?;

    for anchor in &anchors {
        report.nodes_examined += 1;
        let outcome = db
            .atomic(|conn| async move {
                merge_node(&conn, embedder, metric, threshold, anchor).await
            })
            .await
            .map_err(|e| interrupted(&report, e))?;

        if let Some(merge) = outcome {
            report.node_merges += 1;
            report.nodes_removed += merge.removed;
            report.merged_node_ids.push(merge.merged_id);
        }
    }

    let edge_anchors = edge_embed_ids(&conn)
        .await
        .map_err(|e| interrupted(&report, e))?;

    for anchor in edge_anchors {
        report.edges_examined += 1;
        let outcome = db
            .atomic(|conn| async move {
                merge_edge(&conn, embedder, metric, threshold, anchor).await
            })
            .await
            .map_err(|e| interrupted(&report, e))?;

        if let Some(removed) = outcome {
            report.edge_merges += 1;
            report.edges_removed += removed;
        }
    }

    info!(
        node_merges = report.node_merges,
        edge_merges = report.edge_merges,
        threshold,
        "Similarity merge complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_joined_label_keeps_match_order() {
        assert_eq!(joined_label(["Jack", "Jack"]), "Jack,Jack");
        assert_eq!(joined_label(["a"]), "a");
    }

    #[test]
    fn test_keyed_bodies_use_embed_ids() {
        let bodies = keyed_bodies([(7, json!({"name": "Jack"})), (2, json!({"name": "Jak"}))]);
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies["7"], json!({"name": "Jack"}));
        assert_eq!(bodies["2"], json!({"name": "Jak"}));
    }
}
