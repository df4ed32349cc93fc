//! Error types for adapter operations.

use tsql_core::{CompileError, ExecutorError};

/// Errors returned by [`crate::MssqlAdapter`].
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The operation could not be compiled.
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// The database rejected a statement.
    #[error("Execution failed: {source}\n{sql}")]
    Execution {
        /// The statement text that failed.
        sql: String,
        /// Error reported by the executor.
        #[source]
        source: ExecutorError,
    },

    /// No row carries the given key.
    #[error("A {table} doesn't exist with a {key} of {id}")]
    NotFound {
        /// Table name.
        table: String,
        /// Primary-key column.
        key: String,
        /// Key value that was looked up.
        id: String,
    },

    /// An insert did not report the key it generated.
    #[error("Insert into '{table}' returned no identity")]
    MissingIdentity {
        /// Table name.
        table: String,
    },
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
