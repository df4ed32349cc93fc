#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use tsql_core::{
    AdapterSettings, Direction, Executor, ExecutorError, FieldDef, IndexColumn, IndexSpec,
    ModelDef, Param, Registry, Row,
};
use tsql_migrate::prelude::{ActualColumn, ActualIndex, DatatypeMapper, TableSnapshot};

pub fn user_model() -> ModelDef {
    ModelDef::new("User")
        .field(FieldDef::string("name").limit(100))
        .field(FieldDef::string("email").limit(100).indexed())
        .field(FieldDef::number("order").indexed())
        .index(IndexSpec::new(vec![IndexColumn::asc("name"), IndexColumn::desc("order")]))
}

pub fn post_model() -> ModelDef {
    ModelDef::new("Post")
        .field(FieldDef::string("title").limit(200).not_null())
        .field(FieldDef::text("body"))
        .field(FieldDef::boolean("published"))
        .field(FieldDef::date("createdAt").indexed())
}

pub fn registry(models: Vec<ModelDef>) -> Registry {
    Registry::from_models(AdapterSettings::default(), models)
        .unwrap_or_else(|e| panic!("Failed to build registry: {e}"))
}

/// Builds the snapshot a freshly created table for `model` would report.
pub fn snapshot_of(model: &ModelDef) -> TableSnapshot {
    let mapper = DatatypeMapper::new();
    let mut columns = vec![ActualColumn::new(model.primary_key(), "int", false)];
    for field in model.columns() {
        let data_type = mapper.column_type(field).replace(['[', ']'], "");
        columns.push(ActualColumn::new(&field.name, data_type, field.nullable));
    }

    let mut indexes = vec![ActualIndex::new(format!("PK__{}", model.table_name()), model.primary_key(), 1).primary_key()];
    for spec in model.declared_indexes() {
        for (seq, column) in spec.columns.iter().enumerate() {
            let mut index = ActualIndex::new(spec.resolved_name(), &column.field, seq as u32 + 1);
            index.unique = spec.unique;
            index.descending = column.direction == Direction::Desc;
            indexes.push(index);
        }
    }
    TableSnapshot { columns, indexes }
}

/// Records every statement; fails those containing `fail_on`.
#[derive(Default)]
pub struct MockExecutor {
    pub calls: Mutex<Vec<(String, Vec<Param>)>>,
    pub rows: Vec<Row>,
    pub fail_on: Option<String>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn calls(&self) -> Vec<(String, Vec<Param>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>, ExecutorError> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        if let Some(pattern) = &self.fail_on {
            if sql.contains(pattern.as_str()) {
                return Err(ExecutorError::new(format!("Cannot execute: {pattern}")));
            }
        }
        Ok(self.rows.clone())
    }
}
