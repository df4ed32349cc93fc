#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tsql_core::{
    AdapterSettings, Executor, ExecutorError, FieldDef, ModelDef, Param, Registry, Row, SqlValue,
};

pub fn user_model() -> ModelDef {
    ModelDef::new("User")
        .field(FieldDef::string("name").limit(100))
        .field(FieldDef::string("email").limit(100).indexed())
        .field(FieldDef::number("order").indexed())
}

pub fn applies_to_model() -> ModelDef {
    ModelDef::new("AppliesTo")
        .field(FieldDef::number("AppliesToID").primary_key())
        .field(FieldDef::string("Title").limit(100))
        .field(FieldDef::boolean("Editable"))
}

pub fn registry() -> Registry {
    Registry::from_models(
        AdapterSettings::default(),
        vec![user_model(), applies_to_model()],
    )
    .unwrap_or_else(|e| panic!("Failed to build registry: {e}"))
}

pub fn beatle(id: i64, name: &str, order: i64) -> Row {
    Row::new()
        .with("id", SqlValue::Int(id))
        .with("name", SqlValue::Text(name.to_string()))
        .with("email", SqlValue::Null)
        .with("order", SqlValue::Int(order))
}

pub fn count(n: i64) -> Vec<Row> {
    vec![Row::new().with("cnt", SqlValue::Int(n))]
}

/// Replays scripted responses in order and records every call.
#[derive(Default)]
pub struct ScriptedExecutor {
    pub calls: Mutex<Vec<(String, Vec<Param>)>>,
    pub responses: Mutex<VecDeque<Result<Vec<Row>, ExecutorError>>>,
}

impl ScriptedExecutor {
    pub fn new(responses: Vec<Result<Vec<Row>, ExecutorError>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<Param>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.calls().into_iter().map(|(sql, _)| sql).collect()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>, ExecutorError> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
