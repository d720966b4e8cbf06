//! Graph operations
//!
//! Free functions over a `libsql::Connection`. Callers open a unit of work with
//! [`Database::atomic`](crate::db::Database::atomic) and pass its connection
//! down, so every statement of one operation shares a transaction.
//!
//! - [`node_ops`] / [`edge_ops`] - CRUD with embedding maintenance
//! - [`query_builder`] - typed, parametrized attribute predicates
//! - [`vector_search`] - k-nearest lookup over the embedding tables
//! - [`traversal`] - breadth-first adjacency walk
//! - [`merge`] - similarity-based dedup pass

pub mod edge_ops;
pub mod error;
pub mod merge;
pub mod node_ops;
pub mod query_builder;
pub mod traversal;
pub mod vector_search;

pub use error::{GraphError, Result};
