#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use tsql_core::{
    AdapterSettings, Executor, ExecutorError, FieldDef, ModelDef, Param, Registry, Row,
};

pub fn user_model() -> ModelDef {
    ModelDef::new("User")
        .field(FieldDef::string("name").limit(100))
        .field(FieldDef::string("email").limit(100).indexed())
        .field(FieldDef::string("role").indexed())
        .field(FieldDef::number("order").indexed())
}

pub fn applies_to_model() -> ModelDef {
    ModelDef::new("AppliesTo")
        .field(FieldDef::number("AppliesToID").primary_key())
        .field(FieldDef::string("Title").limit(100))
        .field(FieldDef::string("Identifier").limit(100))
        .field(FieldDef::string("Editable"))
}

pub fn registry() -> Registry {
    Registry::from_models(
        AdapterSettings::default(),
        vec![user_model(), applies_to_model()],
    )
    .unwrap_or_else(|e| panic!("Failed to build registry: {e}"))
}

/// Records every statement and answers with a fixed set of rows.
#[derive(Default)]
pub struct RecordingExecutor {
    pub calls: Mutex<Vec<(String, Vec<Param>)>>,
    pub rows: Vec<Row>,
}

impl RecordingExecutor {
    pub fn returning(rows: Vec<Row>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            rows,
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<Param>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>, ExecutorError> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.rows.clone())
    }
}
