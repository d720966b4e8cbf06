//! Database Error Types
//!
//! Errors raised while opening the database, creating the schema or running a
//! unit of work. Graph-level failures (embedding, serialization, merge) are
//! reported through [`crate::GraphError`], which wraps these.

use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {target}: {source}")]
    ConnectionFailed {
        target: String,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(target: impl Into<String>, source: libsql::Error) -> Self {
        Self::ConnectionFailed {
            target: target.into(),
            source,
        }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }
}
