//! Shared helpers for integration tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use personal_graph_core::db::Database;
use personal_graph_core::{Attributes, Graph};
use personal_graph_embeddings::{normalize, DistanceMetric, EmbeddingError, EmbeddingProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Axes of [`KeywordEmbedder`]; one extra bias axis follows them
pub const KEYWORDS: [&str; 8] = [
    "Jack", "James", "Jill", "pilot", "chef", "knows", "likes", "Paris",
];

/// Counts keyword occurrences, one axis per keyword
///
/// Payloads differing only in ids or unknown words embed identically, which
/// makes distances in tests exact and predictable. Text containing "explode"
/// fails; text containing "poison" yields a NaN component.
#[derive(Debug)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    /// Calls from this index on fail
    pub fail_from: AtomicUsize,
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_from: AtomicUsize::new(usize::MAX),
        }
    }
}

impl KeywordEmbedder {
    /// Let `remaining` more calls succeed, fail every later one
    pub fn fail_after(&self, remaining: usize) {
        let calls = self.calls.load(Ordering::SeqCst);
        self.fail_from.store(calls + remaining, Ordering::SeqCst);
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector: Vec<f32> = KEYWORDS
            .iter()
            .map(|keyword| text.matches(keyword).count() as f32)
            .collect();
        vector.push(1.0);
        normalize(&vector)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len() + 1
    }

    fn native_metric(&self) -> DistanceMetric {
        DistanceMetric::Euclidean
    }

    async fn embed(&self, text: &str) -> personal_graph_embeddings::Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_from.load(Ordering::SeqCst) {
            return Err(EmbeddingError::EmptyResponse);
        }
        if text.contains("poison") {
            let mut vector = Self::vector(text);
            vector[0] = f32::NAN;
            return Ok(vector);
        }
        if text.contains("explode") {
            return Err(EmbeddingError::InvalidInput(
                "provider refused payload".to_string(),
            ));
        }
        Ok(Self::vector(text))
    }
}

pub fn attrs(value: serde_json::Value) -> Attributes {
    value.as_object().cloned().unwrap_or_default()
}

/// Graph over a fresh file database
pub async fn create_test_graph() -> Result<(Graph, TempDir)> {
    create_test_graph_with(Arc::new(KeywordEmbedder::default())).await
}

/// Graph sharing `embedder` with the caller
pub async fn create_test_graph_with(embedder: Arc<KeywordEmbedder>) -> Result<(Graph, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db = Database::open_local(temp_dir.path().join("graph.db")).await?;
    let graph = Graph::new(db, embedder);
    Ok((graph, temp_dir))
}

/// Single integer from a scalar query
pub async fn count(graph: &Graph, sql: &str) -> Result<i64> {
    let conn = graph.database().connect_with_timeout().await?;
    let mut rows = conn.query(sql, ()).await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| anyhow::anyhow!("no row for {}", sql))?;
    Ok(row.get::<i64>(0)?)
}

/// Embedding rows without a matching entity row, across both tables
pub async fn orphaned_embeddings(graph: &Graph) -> Result<i64> {
    let nodes = count(
        graph,
        "SELECT COUNT(*) FROM nodes_embedding WHERE embed_id NOT IN (SELECT embed_id FROM nodes)",
    )
    .await?;
    let edges = count(
        graph,
        "SELECT COUNT(*) FROM edges_embedding WHERE embed_id NOT IN (SELECT embed_id FROM edges)",
    )
    .await?;
    Ok(nodes + edges)
}
