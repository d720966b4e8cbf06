//! Vector similarity search over the parallel embedding tables
//!
//! The query payload is serialized to JSON, embedded through the injected
//! provider and compared against every stored vector of the table. The scan is
//! linear; tables are expected to stay personal-sized.

use crate::db::EntityTable;
use crate::models::SearchMatch;
use crate::operations::error::{GraphError, Result};
use libsql::{Connection, Value};
use personal_graph_embeddings::{DistanceMetric, EmbeddingProvider};
use tracing::debug;

/// Embed a JSON payload exactly as it would be stored
pub(crate) async fn embed_json(
    embedder: &dyn EmbeddingProvider,
    payload: &serde_json::Value,
) -> Result<Vec<f32>> {
    let text = serde_json::to_string(payload)?;
    Ok(embedder.embed(&text).await?)
}

/// Store one vector; JSON has no encoding for NaN or infinity
pub(crate) async fn insert_embedding(
    conn: &Connection,
    table: EntityTable,
    embed_id: i64,
    vector: &[f32],
) -> Result<()> {
    if !vector.iter().all(|x| x.is_finite()) {
        return Err(GraphError::NonFiniteVector {
            table: table.embedding_table(),
            embed_id,
        });
    }

    let sql = format!(
        "INSERT INTO {} (embed_id, vector_embedding) VALUES (?1, ?2)",
        table.embedding_table()
    );
    conn.execute(
        &sql,
        vec![
            Value::Integer(embed_id),
            Value::Text(serde_json::to_string(vector)?),
        ],
    )
    .await?;
    Ok(())
}

pub(crate) async fn delete_embedding(
    conn: &Connection,
    table: EntityTable,
    embed_id: i64,
) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE embed_id = ?1", table.embedding_table());
    conn.execute(&sql, vec![Value::Integer(embed_id)]).await?;
    Ok(())
}

/// Find the stored rows nearest to `payload`
///
/// Results are sorted by ascending distance. With a threshold, only matches
/// strictly closer than it are kept, and the filter runs before truncation
/// to `k`. `k == 0` returns nothing without calling the provider.
///
/// # Errors
///
/// A stored vector whose width differs from the query vector is reported as
/// [`GraphError::DimensionMismatch`] rather than silently skipped.
pub async fn vector_search(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    metric: DistanceMetric,
    table: EntityTable,
    payload: &serde_json::Value,
    k: usize,
    threshold: Option<f32>,
) -> Result<Vec<SearchMatch>> {
    if k == 0 {
        return Ok(Vec::new());
    }

    let query = embed_json(embedder, payload).await?;

    let sql = format!(
        "SELECT embed_id, vector_embedding FROM {} ORDER BY embed_id",
        table.embedding_table()
    );
    let mut rows = conn.query(&sql, ()).await?;

    let mut scored = Vec::new();
    while let Some(row) = rows.next().await? {
        let embed_id: i64 = row.get(0)?;
        let raw: String = row.get(1)?;
        let vector: Vec<f32> = serde_json::from_str(&raw).map_err(|e| {
            GraphError::corrupt_row(
                table.embedding_table(),
                format!("vector {} is not a JSON float array: {}", embed_id, e),
            )
        })?;

        if vector.len() != query.len() {
            return Err(GraphError::DimensionMismatch {
                table: table.embedding_table(),
                embed_id,
                expected: query.len(),
                actual: vector.len(),
            });
        }

        scored.push(SearchMatch {
            embed_id,
            distance: metric.distance(&query, &vector),
        });
    }

    let ranked = rank(scored, k, threshold);
    debug!(
        table = table.table(),
        k,
        ?threshold,
        hits = ranked.len(),
        "Vector search complete"
    );
    Ok(ranked)
}

/// Sort ascending (ties by `embed_id`), apply the strict threshold, then keep `k`
fn rank(mut scored: Vec<SearchMatch>, k: usize, threshold: Option<f32>) -> Vec<SearchMatch> {
    scored.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.embed_id.cmp(&b.embed_id))
    });
    if let Some(threshold) = threshold {
        scored.retain(|m| m.distance < threshold);
    }
    scored.truncate(k);
    scored
}
