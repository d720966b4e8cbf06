//! Node CRUD
//!
//! Every function takes the connection of an open unit of work (see
//! [`Database::atomic`](crate::db::Database::atomic)) and keeps the
//! `nodes_embedding` table in lock-step with `nodes`: one embedding row per
//! node, keyed by the node's current `embed_id`.

use crate::db::{next_embed_id, EntityTable};
use crate::models::{
    stored_payload, Attributes, InsertOutcome, Node, NodeId, StoredNode, UpsertOutcome, ID_KEY,
};
use crate::operations::error::{GraphError, Result};
use crate::operations::vector_search::{delete_embedding, insert_embedding};
use libsql::{Connection, Row, Value};
use personal_graph_embeddings::EmbeddingProvider;
use tracing::debug;

const TABLE: &str = "nodes";

/// Decode an `attribute` column that must hold a JSON object
pub(crate) fn parse_attributes(raw: &str, table: &'static str) -> Result<Attributes> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(GraphError::corrupt_row(
            table,
            format!("attribute is not a JSON object: {}", other),
        )),
        Err(e) => Err(GraphError::corrupt_row(
            table,
            format!("attribute is not valid JSON: {}", e),
        )),
    }
}

/// Row layout: `embed_id, id, label, attribute`
pub(crate) fn row_to_stored_node(row: &Row) -> Result<StoredNode> {
    let embed_id: i64 = row.get(0)?;
    let id = NodeId::from_sql(row.get_value(1)?, TABLE)?;
    let label: Option<String> = row.get(2)?;
    let raw: String = row.get(3)?;

    let mut attributes = parse_attributes(&raw, TABLE)?;
    attributes.remove(ID_KEY);

    Ok(StoredNode {
        embed_id,
        node: Node {
            id,
            label: label.unwrap_or_default(),
            attributes,
        },
    })
}

async fn query_nodes(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<Vec<StoredNode>> {
    let mut rows = conn.query(sql, params).await?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next().await? {
        nodes.push(row_to_stored_node(&row)?);
    }
    Ok(nodes)
}

pub async fn find_stored_node(conn: &Connection, id: &NodeId) -> Result<Option<StoredNode>> {
    let nodes = query_nodes(
        conn,
        "SELECT embed_id, id, label, attribute FROM nodes WHERE id = ?1",
        vec![id.into()],
    )
    .await?;
    Ok(nodes.into_iter().next())
}

/// Look up a node by id; `None` when absent
pub async fn find_node(conn: &Connection, id: &NodeId) -> Result<Option<Node>> {
    Ok(find_stored_node(conn, id).await?.map(|stored| stored.node))
}

pub async fn node_by_embed_id(conn: &Connection, embed_id: i64) -> Result<Option<StoredNode>> {
    let nodes = query_nodes(
        conn,
        "SELECT embed_id, id, label, attribute FROM nodes WHERE embed_id = ?1",
        vec![Value::Integer(embed_id)],
    )
    .await?;
    Ok(nodes.into_iter().next())
}

pub async fn find_node_label(conn: &Connection, id: &NodeId) -> Result<Option<String>> {
    let mut rows = conn
        .query("SELECT label FROM nodes WHERE id = ?1", vec![Value::from(id)])
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row.get::<Option<String>>(0)?.unwrap_or_default())),
        None => Ok(None),
    }
}

pub async fn node_exists(conn: &Connection, id: &NodeId) -> Result<bool> {
    let mut rows = conn
        .query("SELECT 1 FROM nodes WHERE id = ?1", vec![Value::from(id)])
        .await?;
    Ok(rows.next().await?.is_some())
}

/// All node ids, oldest `embed_id` first
pub async fn node_ids(conn: &Connection) -> Result<Vec<NodeId>> {
    let mut rows = conn
        .query("SELECT id FROM nodes ORDER BY embed_id", ())
        .await?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(NodeId::from_sql(row.get_value(0)?, TABLE)?);
    }
    Ok(ids)
}

/// Insert a node unless one with the same id exists
pub async fn insert_node(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    node: &Node,
) -> Result<InsertOutcome> {
    if node_exists(conn, &node.id).await? {
        debug!(id = %node.id, "Node already exists, skipping insert");
        return Ok(InsertOutcome::Skipped);
    }

    let embed_id = next_embed_id(conn, EntityTable::Nodes).await?;
    let raw = serde_json::to_string(&node.stored_payload())?;

    conn.execute(
        "INSERT INTO nodes (embed_id, id, label, attribute) VALUES (?1, ?2, ?3, ?4)",
        vec![
            Value::Integer(embed_id),
            Value::from(&node.id),
            Value::Text(node.label.clone()),
            Value::Text(raw.clone()),
        ],
    )
    .await?;

    let vector = embedder.embed(&raw).await?;
    insert_embedding(conn, EntityTable::Nodes, embed_id, &vector).await?;

    debug!(id = %node.id, embed_id, "Inserted node");
    Ok(InsertOutcome::Inserted { embed_id })
}

/// Insert nodes in input order
///
/// Existing ids are skipped without consuming an `embed_id`, so the inserted
/// entries receive contiguous slots.
pub async fn insert_nodes(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    nodes: &[Node],
) -> Result<Vec<InsertOutcome>> {
    let mut outcomes = Vec::with_capacity(nodes.len());
    for node in nodes {
        outcomes.push(insert_node(conn, embedder, node).await?);
    }
    Ok(outcomes)
}

/// Insert, or shallow-merge `node.attributes` over the stored attributes
///
/// On update the old embedding row is deleted, a fresh `embed_id` is
/// allocated and the merged payload is re-embedded. The label is replaced.
pub async fn upsert_node(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    node: &Node,
) -> Result<UpsertOutcome> {
    let Some(current) = find_stored_node(conn, &node.id).await? else {
        return match insert_node(conn, embedder, node).await? {
            InsertOutcome::Inserted { embed_id } => Ok(UpsertOutcome::Inserted { embed_id }),
            // The write lock is held, so the node cannot have appeared since the lookup
            InsertOutcome::Skipped => Err(GraphError::corrupt_row(
                TABLE,
                format!("node {} appeared during upsert", node.id),
            )),
        };
    };

    let mut merged = current.node.attributes;
    for (key, value) in &node.attributes {
        merged.insert(key.clone(), value.clone());
    }
    let raw = serde_json::to_string(&stored_payload(&node.id, &merged))?;

    delete_embedding(conn, EntityTable::Nodes, current.embed_id).await?;
    let embed_id = next_embed_id(conn, EntityTable::Nodes).await?;

    let vector = embedder.embed(&raw).await?;
    insert_embedding(conn, EntityTable::Nodes, embed_id, &vector).await?;

    conn.execute(
        "UPDATE nodes SET label = ?1, attribute = ?2, embed_id = ?3 WHERE id = ?4",
        vec![
            Value::Text(node.label.clone()),
            Value::Text(raw),
            Value::Integer(embed_id),
            Value::from(&node.id),
        ],
    )
    .await?;

    debug!(id = %node.id, old_embed_id = current.embed_id, embed_id, "Updated node");
    Ok(UpsertOutcome::Updated { embed_id })
}

pub async fn upsert_nodes(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    nodes: &[Node],
) -> Result<Vec<UpsertOutcome>> {
    let mut outcomes = Vec::with_capacity(nodes.len());
    for node in nodes {
        outcomes.push(upsert_node(conn, embedder, node).await?);
    }
    Ok(outcomes)
}

/// Remove a node, its incident edges and every related embedding
///
/// Returns `false` when the node does not exist. Edges go first so the foreign
/// keys on `edges` are never violated.
pub async fn remove_node(conn: &Connection, id: &NodeId) -> Result<bool> {
    let Some(stored) = find_stored_node(conn, id).await? else {
        return Ok(false);
    };

    let removed_edges = conn
        .execute(
            "DELETE FROM edges_embedding WHERE embed_id IN
                (SELECT embed_id FROM edges WHERE source = ?1 OR target = ?1)",
            vec![Value::from(id)],
        )
        .await?;
    conn.execute(
        "DELETE FROM edges WHERE source = ?1 OR target = ?1",
        vec![Value::from(id)],
    )
    .await?;

    delete_embedding(conn, EntityTable::Nodes, stored.embed_id).await?;
    conn.execute("DELETE FROM nodes WHERE id = ?1", vec![Value::from(id)])
        .await?;

    debug!(id = %id, embed_id = stored.embed_id, removed_edges, "Removed node");
    Ok(true)
}

/// Remove nodes in order, skipping absent ids; returns how many were removed
pub async fn remove_nodes(conn: &Connection, ids: &[NodeId]) -> Result<usize> {
    let mut removed = 0;
    for id in ids {
        if remove_node(conn, id).await? {
            removed += 1;
        }
    }
    Ok(removed)
}
