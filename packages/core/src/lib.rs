//! Personal Graph Core
//!
//! A personal knowledge-graph store: labeled nodes and edges with JSON
//! attributes, persisted in libsql and paired with vector embeddings so they
//! can be found by similarity as well as by key.
//!
//! # Architecture
//!
//! - **Parallel embedding tables**: every node and edge row has exactly one
//!   vector row keyed by the same `embed_id`, maintained in the same transaction
//! - **Injected embedder**: an [`EmbeddingProvider`](personal_graph_embeddings::EmbeddingProvider)
//!   is passed in at construction, never held globally
//! - **libsql/Turso**: local SQLite files or remote databases through one API
//!
//! # Modules
//!
//! - [`graph`] - The [`Graph`] façade
//! - [`operations`] - CRUD, query builder, vector search, traversal, merge
//! - [`db`] - Connection handling, schema and the atomic executor
//! - [`models`] - Node, Edge, KnowledgeGraph and operation outcomes
//! - [`config`] - TOML / environment configuration
//! - [`generator`] - Text-to-graph generation boundary
//! - [`logging`] - Tracing subscriber setup

pub mod config;
pub mod db;
pub mod generator;
pub mod graph;
pub mod logging;
pub mod models;
pub mod operations;

// Re-export commonly used types
pub use config::GraphConfig;
pub use generator::GraphGenerator;
pub use graph::{Graph, BODY_KEY};
pub use models::*;
pub use operations::query_builder::{Clause, Comparison, Joiner, Query, ResultColumn};
pub use operations::{GraphError, Result};
