//! Error types for schema synchronization.

use std::path::PathBuf;

use tsql_core::{CompileError, ExecutorError};

/// Errors that can occur while introspecting or synchronizing a schema.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A model declaration could not be compiled.
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// The database rejected a statement.
    #[error("Execution failed for table '{table}': {source}\n{sql}")]
    Execution {
        /// Table being synchronized.
        table: String,
        /// The statement text that failed.
        sql: String,
        /// Error reported by the executor.
        #[source]
        source: ExecutorError,
    },

    /// Introspection returned something unusable.
    #[error("Introspection failed for table '{table}': {message}")]
    Introspection {
        /// Table being introspected.
        table: String,
        /// What went wrong.
        message: String,
    },

    /// IO error (reading model or snapshot files).
    #[error("IO error reading '{}': {source}", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
