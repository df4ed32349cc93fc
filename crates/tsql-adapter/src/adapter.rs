//! CRUD operations over an [`Executor`].

use tracing::{debug, info};
use tsql_core::{
    Batch, CompiledStatement, Executor, LogicalType, ModelDef, Record, Registry, Row,
    SelectQuery, SqlValue, StatementBuilder, UpsertPlan, Where,
};

use crate::error::{AdapterError, Result};

/// Column returned by a plain insert.
const INSERT_ID: &str = "insertId";
/// Column returned by a keyed upsert.
const PK_ID: &str = "pkid";
/// Column returned by `SELECT COUNT(*) cnt`.
const COUNT: &str = "cnt";
/// Legacy key every decoded row carries.
const LEGACY_ID: &str = "id";

/// Runs compiled statements for the models of a [`Registry`].
#[derive(Debug)]
pub struct MssqlAdapter<E> {
    registry: Registry,
    executor: E,
}

impl<E: Executor> MssqlAdapter<E> {
    /// Creates an adapter.
    pub const fn new(registry: Registry, executor: E) -> Self {
        Self { registry, executor }
    }

    /// Returns the model registry.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the executor.
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    fn builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(&self.registry)
    }

    async fn run(&self, stmt: &CompiledStatement) -> Result<Vec<Row>> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "Executing");
        self.executor
            .run(stmt)
            .await
            .map_err(|source| AdapterError::Execution {
                sql: stmt.sql.clone(),
                source,
            })
    }

    async fn run_batch(&self, batch: &Batch) -> Result<Vec<Row>> {
        let sql = batch.to_sql();
        debug!(sql = %sql, params = batch.params().len(), "Executing batch");
        self.executor
            .execute_batch(batch)
            .await
            .map_err(|source| AdapterError::Execution { sql, source })
    }

    /// Inserts a record and returns the key the server assigned.
    pub async fn create(&self, model: &str, record: &Record) -> Result<i64> {
        let model_def = self.registry.model(model)?;
        let stmt = self.builder().insert(model, record)?;
        let rows = self.run(&stmt).await?;
        let id = first_i64(&rows, INSERT_ID).ok_or_else(|| AdapterError::MissingIdentity {
            table: model_def.table_name(),
        })?;
        info!(model = %model, id, "Created");
        Ok(id)
    }

    /// Same as [`MssqlAdapter::update_or_create`].
    pub async fn save(&self, model: &str, record: Record) -> Result<Record> {
        self.update_or_create(model, record).await
    }

    /// Updates the row keyed by the record's primary key, inserting it with
    /// that key when no such row exists. A record without a positive key is
    /// inserted and gets a server-assigned key.
    ///
    /// The returned record carries the key under both the primary-key name
    /// and `id`.
    pub async fn update_or_create(&self, model: &str, mut record: Record) -> Result<Record> {
        let model_def = self.registry.model(model)?;
        let (rows, column) = match self.builder().upsert(model, &record)? {
            UpsertPlan::Insert(stmt) => (self.run(&stmt).await?, INSERT_ID),
            UpsertPlan::Keyed {
                id,
                exists,
                update,
                insert,
            } => {
                if count_of(&self.run(&exists).await?) >= 1 {
                    debug!(model = %model, id = %id.to_json(), "Updating existing row");
                    (self.run(&update).await?, PK_ID)
                } else {
                    debug!(model = %model, id = %id.to_json(), "Inserting with explicit key");
                    (self.run_batch(&insert).await?, PK_ID)
                }
            }
        };
        let id = first_i64(&rows, column).ok_or_else(|| AdapterError::MissingIdentity {
            table: model_def.table_name(),
        })?;
        record.insert(model_def.primary_key(), id);
        record.insert(LEGACY_ID, id);
        Ok(record)
    }

    /// Updates an existing row. Fails with [`AdapterError::NotFound`] rather
    /// than creating the row.
    ///
    /// When `id` is `None` the key is read from the record.
    pub async fn update_attributes(
        &self,
        model: &str,
        id: Option<SqlValue>,
        mut record: Record,
    ) -> Result<Record> {
        let model_def = self.registry.model(model)?;
        let pk = model_def.primary_key();
        let id = match id {
            Some(id) => {
                record.insert(pk, id.clone());
                id
            }
            None => StatementBuilder::primary_key_value(model_def, &record)
                .cloned()
                .unwrap_or(SqlValue::Null),
        };
        if !self.exists(model, id.clone()).await? {
            return Err(AdapterError::NotFound {
                table: model_def.table_name(),
                key: pk.to_string(),
                id: id.to_json().to_string(),
            });
        }
        self.update_or_create(model, record).await
    }

    /// Returns `true` if a row with the key exists.
    pub async fn exists(&self, model: &str, id: SqlValue) -> Result<bool> {
        let stmt = self.builder().exists(model, id)?;
        Ok(count_of(&self.run(&stmt).await?) >= 1)
    }

    /// Fetches the row with the key.
    pub async fn find(&self, model: &str, id: SqlValue) -> Result<Option<Record>> {
        let model_def = self.registry.model(model)?;
        let stmt = self.builder().find(model, id)?;
        let rows = self.run(&stmt).await?;
        Ok(rows.first().map(|row| decode_row(model_def, row)))
    }

    /// Fetches every row matching the query.
    pub async fn all(&self, model: &str, query: &SelectQuery) -> Result<Vec<Record>> {
        let model_def = self.registry.model(model)?;
        let stmt = self.builder().select(model, query)?;
        let rows = self.run(&stmt).await?;
        Ok(rows.iter().map(|row| decode_row(model_def, row)).collect())
    }

    /// Counts rows matching the filter.
    pub async fn count(&self, model: &str, filter: &Where) -> Result<i64> {
        let stmt = self.builder().count(model, filter)?;
        Ok(count_of(&self.run(&stmt).await?))
    }

    /// Deletes the row with the key.
    pub async fn destroy(&self, model: &str, id: SqlValue) -> Result<()> {
        let stmt = self.builder().delete(model, Some(id))?;
        self.run(&stmt).await?;
        Ok(())
    }

    /// Deletes every row.
    pub async fn destroy_all(&self, model: &str) -> Result<()> {
        let stmt = self.builder().delete(model, None)?;
        self.run(&stmt).await?;
        info!(model = %model, "Deleted all rows");
        Ok(())
    }
}

fn first_i64(rows: &[Row], column: &str) -> Option<i64> {
    rows.iter().find_map(|row| row.get_i64(column))
}

fn count_of(rows: &[Row]) -> i64 {
    first_i64(rows, COUNT).unwrap_or(0)
}

/// Converts a database row into a record.
///
/// `bit` columns of Boolean fields come back as `0`/`1` and are turned into
/// booleans. The primary key is mirrored into `id`.
#[must_use]
pub fn decode_row(model: &ModelDef, row: &Row) -> Record {
    let mut record: Record = row
        .iter()
        .map(|(column, value)| {
            let value = match model.field_def(column) {
                Some(field) if field.logical_type == LogicalType::Boolean && !value.is_null() => {
                    SqlValue::Bool(value.truthy())
                }
                _ => value.clone(),
            };
            (column.to_string(), value)
        })
        .collect();
    let id = row.get(model.primary_key()).cloned().unwrap_or(SqlValue::Null);
    record.insert(LEGACY_ID, id);
    record
}
