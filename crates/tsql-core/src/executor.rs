//! The execution seam.
//!
//! This crate never talks to a server. Callers plug in an [`Executor`] that
//! sends SQL text with its ordered parameters and returns rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::params::Param;
use crate::statement::{Batch, CompiledStatement};
use crate::value::SqlValue;

/// A failure reported by an [`Executor`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExecutorError {
    /// Server or driver message.
    pub message: String,
    /// Index of the failing statement inside a batch, when known.
    pub statement: Option<usize>,
}

impl ExecutorError {
    /// Creates an error with no statement index.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            statement: None,
        }
    }

    /// Records which statement of a batch failed.
    #[must_use]
    pub const fn at_statement(mut self, index: usize) -> Self {
        self.statement = Some(index);
        self
    }
}

/// One result row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: BTreeMap<String, SqlValue>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: BTreeMap::new(),
        }
    }

    /// Sets a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.columns.insert(column.into(), value);
    }

    /// Sets a column value, builder style.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: SqlValue) -> Self {
        self.insert(column, value);
        self
    }

    /// Returns the raw value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    /// Returns a column as an integer.
    #[must_use]
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    /// Returns a column as a string.
    #[must_use]
    pub fn get_string(&self, column: &str) -> Option<String> {
        self.get(column).and_then(SqlValue::as_str).map(String::from)
    }

    /// Returns a column as a boolean, reading bit columns as numbers.
    #[must_use]
    pub fn get_bool(&self, column: &str) -> Option<bool> {
        match self.get(column)? {
            SqlValue::Null => None,
            other => Some(other.truthy()),
        }
    }

    /// Iterates over the columns, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Converts the row into a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        self.columns
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Sends SQL to a database.
///
/// Implementations must not assume statements are serialized by the
/// caller; the same executor may be shared across concurrent tasks.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executes SQL text with ordered, named parameters.
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>, ExecutorError>;

    /// Executes a compiled statement.
    async fn run(&self, statement: &CompiledStatement) -> Result<Vec<Row>, ExecutorError> {
        self.execute(&statement.sql, statement.params.as_slice()).await
    }

    /// Executes a batch in one round trip.
    async fn execute_batch(&self, batch: &Batch) -> Result<Vec<Row>, ExecutorError> {
        self.execute(&batch.to_sql(), batch.params().as_slice()).await
    }
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>, ExecutorError> {
        (**self).execute(sql, params).await
    }

    async fn execute_batch(&self, batch: &Batch) -> Result<Vec<Row>, ExecutorError> {
        (**self).execute_batch(batch).await
    }
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for &E {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>, ExecutorError> {
        (**self).execute(sql, params).await
    }

    async fn execute_batch(&self, batch: &Batch) -> Result<Vec<Row>, ExecutorError> {
        (**self).execute_batch(batch).await
    }
}
