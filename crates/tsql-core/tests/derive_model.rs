//! Tests for the `#[derive(Model)]` macro output.

use chrono::{DateTime, Utc};
use tsql_core::{
    Direction, IndexColumn, IndexKind, LogicalType, Model, Registry, SelectQuery,
    StatementBuilder,
};

#[allow(dead_code)]
#[derive(Debug, Model)]
pub struct User {
    #[field(limit = 100)]
    pub name: String,
    #[field(limit = 100, index)]
    pub email: Option<String>,
    #[field(index)]
    pub order: i64,
    pub active: bool,
    pub joined: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    #[field(text)]
    pub bio: Option<String>,
    #[field(skip)]
    pub cached: u8,
}

#[allow(dead_code)]
#[derive(Debug, Model)]
#[model(name = "AppliesTo", table = "applies_to")]
#[index(columns = "title, identifier DESC", unique, name = "title_identifier_idx")]
pub struct AppliesTo {
    #[field(primary_key, column = "AppliesToID")]
    pub id: i64,
    #[field(rename = "title", limit = 100)]
    pub title: String,
    #[field(rename = "identifier", unique, desc)]
    pub identifier: String,
}

#[test]
fn test_user_model_fields() {
    let model = User::model_def();
    assert_eq!(User::NAME, "User");
    let names: Vec<&str> = model.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["name", "email", "order", "active", "joined", "tags", "bio"]
    );
    assert_eq!(model.fields[0].limit, Some(100));
    assert!(!model.fields[0].nullable);
    assert!(model.fields[1].nullable);
    assert_eq!(model.fields[3].logical_type, LogicalType::Boolean);
    assert_eq!(model.fields[4].logical_type, LogicalType::Date);
    assert_eq!(
        model.fields[5].logical_type,
        LogicalType::Array(Box::new(LogicalType::String))
    );
    assert_eq!(model.fields[6].logical_type, LogicalType::Text);
}

#[test]
fn test_user_indexes() {
    let names: Vec<String> = User::model_def()
        .declared_indexes()
        .iter()
        .map(tsql_core::IndexSpec::resolved_name)
        .collect();
    assert_eq!(
        names,
        vec!["email_NONCLUSTERED_ASC_idx", "order_NONCLUSTERED_ASC_idx"]
    );
}

#[test]
fn test_container_attributes() {
    let model = AppliesTo::model_def();
    assert_eq!(AppliesTo::NAME, "AppliesTo");
    assert_eq!(model.table.as_deref(), Some("applies_to"));
    assert_eq!(model.indexes.len(), 1);
    let index = &model.indexes[0];
    assert!(index.unique);
    assert_eq!(index.resolved_name(), "title_identifier_idx");
    assert_eq!(
        index.columns,
        vec![IndexColumn::asc("title"), IndexColumn::desc("identifier")]
    );

    let identifier = model.fields[2].index.as_ref().unwrap();
    assert!(identifier.unique);
    assert_eq!(identifier.direction, Direction::Desc);
    assert_eq!(identifier.kind, IndexKind::NonClustered);
}

#[test]
fn test_derived_primary_key_resolves() {
    let mut registry = Registry::new();
    registry.define(AppliesTo::model_def()).unwrap();
    let model = registry.model("AppliesTo").unwrap();
    assert_eq!(model.primary_key(), "AppliesToID");

    let stmt = StatementBuilder::new(&registry)
        .select("AppliesTo", &SelectQuery::new().limit(1))
        .unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT * FROM [dbo].[applies_to]\nORDER BY [AppliesToID] OFFSET 0 ROWS FETCH NEXT 1 ROWS ONLY"
    );
}
