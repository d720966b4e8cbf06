//! Database Layer
//!
//! All storage goes through libsql:
//!
//! - Connection management for local SQLite files and remote Turso databases
//! - Idempotent schema creation for nodes, edges and their embedding tables
//! - The atomic unit-of-work executor used by every mutating operation
//! - Transactional `embed_id` allocation

mod database;
mod error;

pub use database::{next_embed_id, ConnectionMode, Database, EntityTable};
pub use error::DatabaseError;
