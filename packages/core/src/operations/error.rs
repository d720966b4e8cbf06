//! Error types for graph operations
//!
//! Absence is never an error here: lookups return `None` or empty collections,
//! and duplicate or dangling edges are reported through
//! [`ConnectOutcome`](crate::models::ConnectOutcome). What remains are storage
//! failures, provider failures and data that cannot be decoded.
//!
//! # Examples
//!
//! ```rust
//! use personal_graph_core::GraphError;
//!
//! let err = GraphError::corrupt_row("nodes", "attribute is not a JSON object");
//! assert!(err.to_string().contains("nodes"));
//! ```

use crate::db::DatabaseError;
use personal_graph_embeddings::EmbeddingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Database operation failed: {0}")]
    Libsql(#[from] libsql::Error),

    /// The embedding provider failed; the unit of work was rolled back
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded
    #[error("Corrupt row in '{table}': {reason}")]
    CorruptRow { table: &'static str, reason: String },

    /// A stored vector does not match the width of the query vector
    #[error("Vector {embed_id} in '{table}' has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        table: &'static str,
        embed_id: i64,
        expected: usize,
        actual: usize,
    },

    /// The provider returned NaN or infinity; nothing was stored
    #[error("Vector {embed_id} for '{table}' contains a non-finite value")]
    NonFiniteVector { table: &'static str, embed_id: i64 },

    #[error("Invalid attributes: {0}")]
    InvalidAttributes(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Graph generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The merge pass stopped partway; `processed` merges are already committed
    #[error("Similarity merge interrupted after {processed} merges: {source}")]
    MergeInterrupted {
        processed: usize,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Create a corrupt row error
    pub fn corrupt_row(table: &'static str, reason: impl Into<String>) -> Self {
        Self::CorruptRow {
            table,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_merge_interrupted_exposes_source() {
        let err = GraphError::MergeInterrupted {
            processed: 3,
            source: Box::new(GraphError::config("boom")),
        };
        assert!(err.to_string().contains("after 3 merges"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_embedding_error_converts() {
        let err: GraphError = EmbeddingError::InvalidInput("empty".to_string()).into();
        assert!(matches!(err, GraphError::Embedding(_)));
    }
}
