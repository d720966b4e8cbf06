//! Database Connection Management
//!
//! This module owns the libsql database handle, the on-disk schema and the
//! atomic unit-of-work executor every mutation in the crate goes through.
//!
//! # Architecture
//!
//! - **Local or remote**: a SQLite file opened through libsql, or a Turso /
//!   sqld database reached over the network
//! - **Parallel embedding tables**: `nodes_embedding` and `edges_embedding`
//!   hold one JSON-encoded vector per row, joined on `embed_id`
//! - **Counter table**: `embed_counters` hands out `embed_id` slots inside the
//!   same transaction as the insert that consumes them
//! - **Foreign keys**: `edges.source` / `edges.target` reference `nodes.id`
//!   and are enforced on every connection
//!
//! # Database Connection Patterns
//!
//! Mutations use [`Database::atomic`], which opens a connection, begins an
//! `IMMEDIATE` transaction, runs the unit of work and commits or rolls back.
//! Read-only lookups use [`Database::connect_with_timeout`] directly.
//!
//! ```no_run
//! # use personal_graph_core::db::{Database, DatabaseError};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open_local("./data/graph.db").await?;
//! let count = db
//!     .atomic(|conn| async move {
//!         let mut rows = conn.query("SELECT COUNT(*) FROM nodes", ()).await?;
//!         let row = rows.next().await?;
//!         Ok::<i64, DatabaseError>(row.map(|r| r.get(0)).transpose()?.unwrap_or(0))
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use libsql::{Builder, Connection};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Milliseconds a local connection waits on a locked database before failing
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Local file-based database
    Local(PathBuf),
    /// Remote database (Turso Cloud or sqld)
    Remote { url: String, auth_token: String },
}

impl ConnectionMode {
    /// Classify a database URL.
    ///
    /// `libsql://`, `http(s)://` and `ws(s)://` URLs are remote; anything else
    /// is treated as a local file path.
    pub fn from_url(url: &str, auth_token: Option<String>) -> Self {
        const REMOTE_SCHEMES: [&str; 5] = ["libsql://", "https://", "http://", "wss://", "ws://"];

        if REMOTE_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            ConnectionMode::Remote {
                url: url.to_string(),
                auth_token: auth_token.unwrap_or_default(),
            }
        } else {
            ConnectionMode::Local(PathBuf::from(url))
        }
    }

    /// Path or URL, without credentials
    pub fn describe(&self) -> String {
        match self {
            ConnectionMode::Local(path) => path.display().to_string(),
            ConnectionMode::Remote { url, .. } => url.clone(),
        }
    }
}

/// The two entity tables and the bookkeeping tied to each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityTable {
    Nodes,
    Edges,
}

impl EntityTable {
    /// Primary table name
    pub fn table(self) -> &'static str {
        match self {
            EntityTable::Nodes => "nodes",
            EntityTable::Edges => "edges",
        }
    }

    /// Parallel embedding table name
    pub fn embedding_table(self) -> &'static str {
        match self {
            EntityTable::Nodes => "nodes_embedding",
            EntityTable::Edges => "edges_embedding",
        }
    }
}

/// Handle to the graph database
///
/// Cheap to clone; every clone shares the same underlying libsql database.
#[derive(Clone)]
pub struct Database {
    db: Arc<libsql::Database>,
    mode: ConnectionMode,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("target", &self.mode.describe())
            .finish()
    }
}

impl Database {
    /// Open (or create) the database and initialize its schema
    ///
    /// This will:
    /// 1. Ensure the parent directory of a local file exists
    /// 2. Build the libsql database for the given mode
    /// 3. Create tables, indexes and counters if they do not exist yet
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created, the
    /// connection fails or schema initialization fails.
    pub async fn open(mode: ConnectionMode) -> Result<Self, DatabaseError> {
        info!(target_db = %mode.describe(), "Opening graph database");

        let db = match &mode {
            ConnectionMode::Local(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                Builder::new_local(path)
                    .build()
                    .await
                    .map_err(|e| DatabaseError::connection_failed(mode.describe(), e))?
            }
            ConnectionMode::Remote { url, auth_token } => {
                Builder::new_remote(url.clone(), auth_token.clone())
                    .build()
                    .await
                    .map_err(|e| DatabaseError::connection_failed(mode.describe(), e))?
            }
        };

        let database = Self {
            db: Arc::new(db),
            mode,
        };
        database.initialize_schema().await?;

        Ok(database)
    }

    /// Open a local database file
    pub async fn open_local(path: impl Into<PathBuf>) -> Result<Self, DatabaseError> {
        Self::open(ConnectionMode::Local(path.into())).await
    }

    pub fn mode(&self) -> &ConnectionMode {
        &self.mode
    }

    fn is_local(&self) -> bool {
        matches!(self.mode, ConnectionMode::Local(_))
    }

    /// Get a raw connection with no pragmas applied
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        self.db
            .connect()
            .map_err(|e| DatabaseError::connection_failed(self.mode.describe(), e))
    }

    /// Get a connection with busy timeout and foreign keys configured
    ///
    /// Use this in async code. Local connections wait up to five seconds on a
    /// locked database instead of failing with `SQLITE_BUSY`.
    pub async fn connect_with_timeout(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect()?;

        if self.is_local() {
            self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
                .await?;
        }
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements may return rows, so they go through `query()`.
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create tables, indexes and counters (idempotent)
    ///
    /// # Schema
    ///
    /// - `nodes(embed_id, id, label, attribute)`: `id` is untyped so integer and
    ///   text identifiers both round-trip
    /// - `edges(embed_id, source, target, label, attribute)` with foreign keys
    ///   to `nodes(id)` and a uniqueness constraint over the whole edge
    /// - `nodes_embedding` / `edges_embedding(embed_id, vector_embedding)`
    /// - `embed_counters(name, next_id)`
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        if self.is_local() {
            self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
                .await?;
        }

        let statements: [(&str, &str); 8] = [
            (
                "nodes table",
                "CREATE TABLE IF NOT EXISTS nodes (
                    embed_id INTEGER NOT NULL UNIQUE,
                    id NOT NULL UNIQUE,
                    label TEXT,
                    attribute JSON NOT NULL
                )",
            ),
            (
                "edges table",
                "CREATE TABLE IF NOT EXISTS edges (
                    embed_id INTEGER NOT NULL UNIQUE,
                    source NOT NULL REFERENCES nodes(id),
                    target NOT NULL REFERENCES nodes(id),
                    label TEXT,
                    attribute JSON NOT NULL,
                    UNIQUE(source, target, label, attribute)
                )",
            ),
            (
                "nodes_embedding table",
                "CREATE TABLE IF NOT EXISTS nodes_embedding (
                    embed_id INTEGER PRIMARY KEY,
                    vector_embedding JSON NOT NULL
                )",
            ),
            (
                "edges_embedding table",
                "CREATE TABLE IF NOT EXISTS edges_embedding (
                    embed_id INTEGER PRIMARY KEY,
                    vector_embedding JSON NOT NULL
                )",
            ),
            (
                "embed_counters table",
                "CREATE TABLE IF NOT EXISTS embed_counters (
                    name TEXT PRIMARY KEY,
                    next_id INTEGER NOT NULL
                )",
            ),
            (
                "index 'idx_edges_source'",
                "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source)",
            ),
            (
                "index 'idx_edges_target'",
                "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target)",
            ),
            // Databases written before the counter table existed start after their current max
            (
                "embed counters",
                "INSERT OR IGNORE INTO embed_counters (name, next_id) VALUES
                    ('nodes', (SELECT COALESCE(MAX(embed_id), 0) + 1 FROM nodes)),
                    ('edges', (SELECT COALESCE(MAX(embed_id), 0) + 1 FROM edges))",
            ),
        ];

        for (what, sql) in statements {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!("Failed to create {}: {}", what, e))
            })?;
        }

        debug!("Graph schema ready");
        Ok(())
    }

    /// Run a unit of work inside one `IMMEDIATE` transaction
    ///
    /// The closure receives a handle to the transaction's connection. On `Ok`
    /// the transaction is committed; on `Err` it is rolled back and the error
    /// is returned unchanged. The connection is dropped on every exit path.
    ///
    /// `IMMEDIATE` takes the write lock up front, so existence checks and
    /// counter reads inside the unit of work cannot race another writer.
    pub async fn atomic<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DatabaseError>,
    {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        match work(conn.clone()).await {
            Ok(value) => {
                if let Err(e) = conn.execute("COMMIT", ()).await {
                    let _rollback = conn.execute("ROLLBACK", ()).await;
                    return Err(DatabaseError::sql_execution(format!(
                        "Failed to commit transaction: {}",
                        e
                    ))
                    .into());
                }
                Ok(value)
            }
            Err(e) => {
                match conn.execute("ROLLBACK", ()).await {
                    Ok(_) => warn!("Unit of work failed, transaction rolled back"),
                    Err(rollback_err) => {
                        warn!(error = %rollback_err, "Unit of work failed and rollback failed")
                    }
                }
                Err(e)
            }
        }
    }
}

/// Allocate the next `embed_id` for a table
///
/// Must run inside [`Database::atomic`]. Slots are never reused: deleting a
/// row leaves a gap, and a rolled-back transaction also rolls back the counter.
pub async fn next_embed_id(conn: &Connection, table: EntityTable) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query(
            "UPDATE embed_counters SET next_id = next_id + 1 WHERE name = ?1 RETURNING next_id - 1",
            libsql::params![table.table()],
        )
        .await?;

    let row = rows.next().await?.ok_or_else(|| {
        DatabaseError::sql_execution(format!("embed counter for '{}' is missing", table.table()))
    })?;
    let embed_id: i64 = row.get(0)?;

    debug!(table = table.table(), embed_id, "Allocated embed_id");
    Ok(embed_id)
}

#[cfg(test)]
#[path = "database_test.rs"]
mod database_test;
