//! Edge CRUD and degree queries
//!
//! Edges are identified by the full `(source, target, label, attribute)` tuple.
//! Attributes are serialized with sorted keys, so two equal attribute objects
//! always produce the same stored text and compare equal in SQL.

use crate::db::{next_embed_id, EntityTable};
use crate::models::{ConnectOutcome, Edge, NodeId, StoredEdge};
use crate::operations::error::Result;
use crate::operations::node_ops::{node_exists, parse_attributes};
use crate::operations::vector_search::{delete_embedding, embed_json, insert_embedding};
use libsql::{Connection, Row, Value};
use personal_graph_embeddings::EmbeddingProvider;
use tracing::debug;

const TABLE: &str = "edges";

/// Row layout: `embed_id, source, target, label, attribute`
pub(crate) fn row_to_stored_edge(row: &Row) -> Result<StoredEdge> {
    let embed_id: i64 = row.get(0)?;
    let source = NodeId::from_sql(row.get_value(1)?, TABLE)?;
    let target = NodeId::from_sql(row.get_value(2)?, TABLE)?;
    let label: Option<String> = row.get(3)?;
    let raw: String = row.get(4)?;

    Ok(StoredEdge {
        embed_id,
        edge: Edge {
            source,
            target,
            label: label.unwrap_or_default(),
            attributes: parse_attributes(&raw, TABLE)?,
        },
    })
}

async fn query_edges(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<Vec<StoredEdge>> {
    let mut rows = conn.query(sql, params).await?;
    let mut edges = Vec::new();
    while let Some(row) = rows.next().await? {
        edges.push(row_to_stored_edge(&row)?);
    }
    Ok(edges)
}

fn edge_key(edge: &Edge) -> Result<Vec<Value>> {
    Ok(vec![
        Value::from(&edge.source),
        Value::from(&edge.target),
        Value::Text(edge.label.clone()),
        Value::Text(serde_json::to_string(&edge.attributes)?),
    ])
}

pub async fn edge_exists(conn: &Connection, edge: &Edge) -> Result<bool> {
    let mut rows = conn
        .query(
            "SELECT 1 FROM edges WHERE source = ?1 AND target = ?2 AND label = ?3 AND attribute = ?4",
            edge_key(edge)?,
        )
        .await?;
    Ok(rows.next().await?.is_some())
}

pub async fn edge_by_embed_id(conn: &Connection, embed_id: i64) -> Result<Option<StoredEdge>> {
    let edges = query_edges(
        conn,
        "SELECT embed_id, source, target, label, attribute FROM edges WHERE embed_id = ?1",
        vec![Value::Integer(embed_id)],
    )
    .await?;
    Ok(edges.into_iter().next())
}

/// All edge `embed_id`s, oldest first
pub async fn edge_embed_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut rows = conn
        .query("SELECT embed_id FROM edges ORDER BY embed_id", ())
        .await?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(row.get::<i64>(0)?);
    }
    Ok(ids)
}

/// Connect two existing nodes
///
/// Nothing is written when an identical edge exists or either endpoint is
/// missing; the outcome says which.
pub async fn connect_nodes(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    edge: &Edge,
) -> Result<ConnectOutcome> {
    if edge_exists(conn, edge).await? {
        debug!(source = %edge.source, target = %edge.target, label = %edge.label, "Duplicate edge, skipping");
        return Ok(ConnectOutcome::DuplicateEdge);
    }
    if !node_exists(conn, &edge.source).await? || !node_exists(conn, &edge.target).await? {
        debug!(source = %edge.source, target = %edge.target, "Edge endpoint missing, skipping");
        return Ok(ConnectOutcome::MissingEndpoint);
    }

    let embed_id = next_embed_id(conn, EntityTable::Edges).await?;
    let mut params = vec![Value::Integer(embed_id)];
    params.extend(edge_key(edge)?);

    conn.execute(
        "INSERT INTO edges (embed_id, source, target, label, attribute) VALUES (?1, ?2, ?3, ?4, ?5)",
        params,
    )
    .await?;

    let vector = embed_json(embedder, &edge.embedding_payload()).await?;
    insert_embedding(conn, EntityTable::Edges, embed_id, &vector).await?;

    debug!(source = %edge.source, target = %edge.target, embed_id, "Connected nodes");
    Ok(ConnectOutcome::Connected { embed_id })
}

/// Connect in input order; skipped entries consume no `embed_id`
pub async fn connect_many_nodes(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    edges: &[Edge],
) -> Result<Vec<ConnectOutcome>> {
    let mut outcomes = Vec::with_capacity(edges.len());
    for edge in edges {
        outcomes.push(connect_nodes(conn, embedder, edge).await?);
    }
    Ok(outcomes)
}

/// Remove one edge and its embedding; `false` when absent
pub async fn remove_edge_by_embed_id(conn: &Connection, embed_id: i64) -> Result<bool> {
    let deleted = conn
        .execute(
            "DELETE FROM edges WHERE embed_id = ?1",
            vec![Value::Integer(embed_id)],
        )
        .await?;
    if deleted == 0 {
        return Ok(false);
    }
    delete_embedding(conn, EntityTable::Edges, embed_id).await?;
    Ok(true)
}

/// Edges pointing at `node`
pub async fn inbound_edges(conn: &Connection, node: &NodeId) -> Result<Vec<Edge>> {
    let edges = query_edges(
        conn,
        "SELECT embed_id, source, target, label, attribute FROM edges WHERE target = ?1 ORDER BY embed_id",
        vec![Value::from(node)],
    )
    .await?;
    Ok(edges.into_iter().map(|stored| stored.edge).collect())
}

/// Edges leaving `node`
pub async fn outbound_edges(conn: &Connection, node: &NodeId) -> Result<Vec<Edge>> {
    let edges = query_edges(
        conn,
        "SELECT embed_id, source, target, label, attribute FROM edges WHERE source = ?1 ORDER BY embed_id",
        vec![Value::from(node)],
    )
    .await?;
    Ok(edges.into_iter().map(|stored| stored.edge).collect())
}

/// Edges in either direction
pub async fn connections(conn: &Connection, node: &NodeId) -> Result<Vec<Edge>> {
    let edges = query_edges(
        conn,
        "SELECT embed_id, source, target, label, attribute FROM edges
         WHERE source = ?1 OR target = ?1 ORDER BY embed_id",
        vec![Value::from(node)],
    )
    .await?;
    Ok(edges.into_iter().map(|stored| stored.edge).collect())
}
