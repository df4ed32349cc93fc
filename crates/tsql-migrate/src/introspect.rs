//! Introspection of the live schema.
//!
//! Facts are fetched fresh on every synchronization run and never cached.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tsql_core::{Dialect, Executor, MssqlDialect, Param, Row, SqlValue};

use crate::error::{MigrateError, Result};

/// A column as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualColumn {
    /// Column name.
    pub name: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Raw type string, e.g. `varchar(100)` or `int`.
    pub data_type: String,
}

impl ActualColumn {
    /// Creates a column fact.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            nullable,
            data_type: data_type.into(),
        }
    }
}

/// One column's membership in an index, as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualIndex {
    /// Index name.
    pub name: String,
    /// Column name.
    pub column: String,
    /// 1-based position of the column inside the index key.
    pub seq_in_index: u32,
    /// Whether the index is unique.
    #[serde(default)]
    pub unique: bool,
    /// Whether the index backs the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Whether this column is sorted descending inside the key.
    #[serde(default, alias = "isDescendingKey")]
    pub descending: bool,
}

impl ActualIndex {
    /// Creates an index-column fact.
    #[must_use]
    pub fn new(name: impl Into<String>, column: impl Into<String>, seq_in_index: u32) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            seq_in_index,
            unique: false,
            primary_key: false,
            descending: false,
        }
    }

    /// Marks the column as sorted descending.
    #[must_use]
    pub const fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Marks the index unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the index as the primary-key index.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.unique = true;
        self
    }
}

/// Source of live schema facts.
#[async_trait]
pub trait Introspector: Send + Sync {
    /// Returns the columns of a table in ordinal order. An empty list means
    /// the table does not exist.
    async fn columns_of(&self, table: &str) -> Result<Vec<ActualColumn>>;

    /// Returns one entry per (index, column) pair.
    async fn indexes_of(&self, table: &str) -> Result<Vec<ActualIndex>>;
}

const COLUMNS_SQL: &str = "SELECT COLUMN_NAME, IS_NULLABLE, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = @schema AND TABLE_NAME = @table \
     ORDER BY ORDINAL_POSITION";

const INDEXES_SQL: &str = "SELECT i.name AS index_name, c.name AS column_name, \
     ic.key_ordinal AS seq_in_index, i.is_unique, i.is_primary_key, ic.is_descending_key \
     FROM sys.indexes i \
     JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
     JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
     WHERE i.object_id = OBJECT_ID(@table) AND ic.key_ordinal > 0 \
     ORDER BY i.name, ic.key_ordinal";

/// Types whose length is part of the declared type.
const SIZED_TYPES: &[&str] = &["char", "varchar", "nchar", "nvarchar", "binary", "varbinary"];

/// Reads schema facts from the SQL Server catalog through an [`Executor`].
#[derive(Debug, Clone)]
pub struct CatalogIntrospector<E> {
    executor: E,
    schema: String,
}

impl<E: Executor> CatalogIntrospector<E> {
    /// Creates an introspector for tables in `schema`.
    pub fn new(executor: E, schema: impl Into<String>) -> Self {
        Self {
            executor,
            schema: schema.into(),
        }
    }

    async fn query(&self, table: &str, sql: &str, params: &[Param]) -> Result<Vec<Row>> {
        debug!(table = %table, sql = %sql, "Introspecting");
        self.executor
            .execute(sql, params)
            .await
            .map_err(|source| MigrateError::Execution {
                table: table.to_string(),
                sql: sql.to_string(),
                source,
            })
    }
}

fn required(row: &Row, table: &str, column: &str) -> Result<String> {
    row.get_string(column)
        .ok_or_else(|| MigrateError::Introspection {
            table: table.to_string(),
            message: format!("catalog row is missing '{column}'"),
        })
}

fn column_from_row(row: &Row, table: &str) -> Result<ActualColumn> {
    let name = required(row, table, "COLUMN_NAME")?;
    let nullable = required(row, table, "IS_NULLABLE")?.eq_ignore_ascii_case("YES");
    let base = required(row, table, "DATA_TYPE")?;
    let data_type = match row.get_i64("CHARACTER_MAXIMUM_LENGTH") {
        Some(-1) if SIZED_TYPES.contains(&base.to_lowercase().as_str()) => format!("{base}(max)"),
        Some(len) if SIZED_TYPES.contains(&base.to_lowercase().as_str()) => format!("{base}({len})"),
        _ => base,
    };
    Ok(ActualColumn {
        name,
        nullable,
        data_type,
    })
}

fn index_from_row(row: &Row, table: &str) -> Result<ActualIndex> {
    let seq = row
        .get_i64("seq_in_index")
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| MigrateError::Introspection {
            table: table.to_string(),
            message: "catalog row has no usable 'seq_in_index'".to_string(),
        })?;
    Ok(ActualIndex {
        name: required(row, table, "index_name")?,
        column: required(row, table, "column_name")?,
        seq_in_index: seq,
        unique: row.get_bool("is_unique").unwrap_or(false),
        primary_key: row.get_bool("is_primary_key").unwrap_or(false),
        descending: row.get_bool("is_descending_key").unwrap_or(false),
    })
}

#[async_trait]
impl<E: Executor> Introspector for CatalogIntrospector<E> {
    async fn columns_of(&self, table: &str) -> Result<Vec<ActualColumn>> {
        let params = [
            Param::new("schema", SqlValue::Text(self.schema.clone())),
            Param::new("table", SqlValue::Text(table.to_string())),
        ];
        self.query(table, COLUMNS_SQL, &params)
            .await?
            .iter()
            .map(|row| column_from_row(row, table))
            .collect()
    }

    async fn indexes_of(&self, table: &str) -> Result<Vec<ActualIndex>> {
        let qualified = MssqlDialect.qualified_table(&self.schema, table);
        let params = [Param::new("table", SqlValue::Text(qualified))];
        self.query(table, INDEXES_SQL, &params)
            .await?
            .iter()
            .map(|row| index_from_row(row, table))
            .collect()
    }
}

/// Schema facts for one table in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Columns in ordinal order.
    #[serde(default)]
    pub columns: Vec<ActualColumn>,
    /// Index memberships.
    #[serde(default)]
    pub indexes: Vec<ActualIndex>,
}

/// Serves schema facts from a recorded snapshot, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotIntrospector {
    tables: BTreeMap<String, TableSnapshot>,
}

impl SnapshotIntrospector {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a table.
    #[must_use]
    pub fn table(mut self, name: impl Into<String>, snapshot: TableSnapshot) -> Self {
        self.tables.insert(name.into(), snapshot);
        self
    }

    /// Loads a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| MigrateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Introspector for SnapshotIntrospector {
    async fn columns_of(&self, table: &str) -> Result<Vec<ActualColumn>> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn indexes_of(&self, table: &str) -> Result<Vec<ActualIndex>> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.indexes.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_from_catalog_row() {
        let row: Row = vec![
            ("COLUMN_NAME", SqlValue::Text("email".into())),
            ("IS_NULLABLE", SqlValue::Text("YES".into())),
            ("DATA_TYPE", SqlValue::Text("varchar".into())),
            ("CHARACTER_MAXIMUM_LENGTH", SqlValue::Int(100)),
        ]
        .into_iter()
        .collect();
        let col = column_from_row(&row, "User").unwrap();
        assert_eq!(col, ActualColumn::new("email", "varchar(100)", true));
    }

    #[test]
    fn test_unsized_types_ignore_length() {
        let row: Row = vec![
            ("COLUMN_NAME", SqlValue::Text("bio".into())),
            ("IS_NULLABLE", SqlValue::Text("NO".into())),
            ("DATA_TYPE", SqlValue::Text("text".into())),
            ("CHARACTER_MAXIMUM_LENGTH", SqlValue::Int(2_147_483_647)),
        ]
        .into_iter()
        .collect();
        let col = column_from_row(&row, "User").unwrap();
        assert_eq!(col.data_type, "text");
        assert!(!col.nullable);
    }

    #[test]
    fn test_max_length() {
        let row: Row = vec![
            ("COLUMN_NAME", SqlValue::Text("doc".into())),
            ("IS_NULLABLE", SqlValue::Text("YES".into())),
            ("DATA_TYPE", SqlValue::Text("nvarchar".into())),
            ("CHARACTER_MAXIMUM_LENGTH", SqlValue::Int(-1)),
        ]
        .into_iter()
        .collect();
        assert_eq!(column_from_row(&row, "T").unwrap().data_type, "nvarchar(max)");
    }

    #[test]
    fn test_missing_catalog_column() {
        let row: Row = vec![("COLUMN_NAME", SqlValue::Text("x".into()))]
            .into_iter()
            .collect();
        assert!(matches!(
            column_from_row(&row, "T"),
            Err(MigrateError::Introspection { .. })
        ));
    }

    #[test]
    fn test_index_from_catalog_row() {
        let row: Row = vec![
            ("index_name", SqlValue::Text("PK_User".into())),
            ("column_name", SqlValue::Text("id".into())),
            ("seq_in_index", SqlValue::Int(1)),
            ("is_unique", SqlValue::Bool(true)),
            ("is_primary_key", SqlValue::Int(1)),
        ]
        .into_iter()
        .collect();
        let idx = index_from_row(&row, "User").unwrap();
        assert_eq!(idx, ActualIndex::new("PK_User", "id", 1).primary_key());
    }

    #[test]
    fn test_descending_key_from_catalog_row() {
        let row: Row = vec![
            ("index_name", SqlValue::Text("name_order_NONCLUSTERED_ASC_idx".into())),
            ("column_name", SqlValue::Text("order".into())),
            ("seq_in_index", SqlValue::Int(2)),
            ("is_unique", SqlValue::Bool(false)),
            ("is_primary_key", SqlValue::Bool(false)),
            ("is_descending_key", SqlValue::Int(1)),
        ]
        .into_iter()
        .collect();
        let idx = index_from_row(&row, "User").unwrap();
        assert!(idx.descending);
        assert_eq!(idx.seq_in_index, 2);
    }

    #[test]
    fn test_snapshot_unknown_table_is_empty() {
        let snapshot = SnapshotIntrospector::new();
        let cols = tokio_test::block_on(snapshot.columns_of("Nope")).unwrap();
        assert!(cols.is_empty());
    }
}
