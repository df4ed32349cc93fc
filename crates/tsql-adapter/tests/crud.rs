//! Adapter operations against a scripted executor.

mod common;

use common::{ScriptedExecutor, beatle, count, registry};
use serde_json::json;
use tsql_adapter::{AdapterError, MssqlAdapter};
use tsql_core::{ExecutorError, Record, Row, SelectQuery, SqlValue, Where};

#[tokio::test]
async fn test_inq_selects_the_two_beatles() {
    let executor = ScriptedExecutor::new(vec![Ok(vec![
        beatle(1, "John Lennon", 2),
        beatle(2, "Paul McCartney", 1),
    ])]);
    let adapter = MssqlAdapter::new(registry(), executor);
    let filter = Where::from_json(json!({"name": {"inq": ["John Lennon", "Paul McCartney"]}})).unwrap();

    let users = adapter
        .all("User", &SelectQuery::new().filter(filter))
        .await
        .unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].get("name"), Some(&SqlValue::Text("John Lennon".into())));
    let calls = adapter.executor().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0,
        "SELECT * FROM [dbo].[User]\nWHERE [name] IN (@param1,@param2)"
    );
    assert_eq!(calls[0].1[0].name, "param1");
    assert_eq!(calls[0].1[0].value, SqlValue::Text("John Lennon".into()));
    assert_eq!(calls[0].1[1].value, SqlValue::Text("Paul McCartney".into()));
}

#[tokio::test]
async fn test_create_returns_identity() {
    let executor = ScriptedExecutor::new(vec![Ok(vec![
        Row::new().with("insertId", SqlValue::Int(42)),
    ])]);
    let adapter = MssqlAdapter::new(registry(), executor);

    let id = adapter
        .create("User", &Record::new().set("id", 9).set("name", "Ringo Starr"))
        .await
        .unwrap();

    assert_eq!(id, 42);
    let sql = adapter.executor().sql();
    assert!(sql[0].starts_with("INSERT INTO [dbo].[User] ([name])\nVALUES ((@param1));"));
}

#[tokio::test]
async fn test_create_without_identity_fails() {
    let adapter = MssqlAdapter::new(registry(), ScriptedExecutor::new(vec![Ok(Vec::new())]));
    let err = adapter
        .create("User", &Record::new().set("name", "Pete Best"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::MissingIdentity { table } if table == "User"));
}

#[tokio::test]
async fn test_save_without_key_inserts() {
    let executor = ScriptedExecutor::new(vec![Ok(vec![
        Row::new().with("insertId", SqlValue::Int(5)),
    ])]);
    let adapter = MssqlAdapter::new(registry(), executor);

    let saved = adapter
        .save("User", Record::new().set("id", 0).set("name", "George Harrison"))
        .await
        .unwrap();

    assert_eq!(saved.get("id"), Some(&SqlValue::Int(5)));
    let sql = adapter.executor().sql();
    assert_eq!(sql.len(), 1);
    assert!(!sql[0].contains("IDENTITY_INSERT"));
}

#[tokio::test]
async fn test_save_existing_key_updates() {
    let executor = ScriptedExecutor::new(vec![
        Ok(count(1)),
        Ok(vec![Row::new().with("pkid", SqlValue::Int(3))]),
    ]);
    let adapter = MssqlAdapter::new(registry(), executor);

    let saved = adapter
        .save("User", Record::new().set("id", 3).set("name", "John Lennon"))
        .await
        .unwrap();

    assert_eq!(saved.get("id"), Some(&SqlValue::Int(3)));
    let sql = adapter.executor().sql();
    assert_eq!(sql[0], "SELECT COUNT(*) cnt FROM [dbo].[User] WHERE [id] = (@id)");
    assert_eq!(
        sql[1],
        "UPDATE [dbo].[User]\nSET [name]=(@param1)\nWHERE [id] = (@id);\nSELECT @id AS pkid;"
    );
}

#[tokio::test]
async fn test_save_missing_key_inserts_with_identity_bracket() {
    let executor = ScriptedExecutor::new(vec![
        Ok(count(0)),
        Ok(vec![Row::new().with("pkid", SqlValue::Int(12))]),
    ]);
    let adapter = MssqlAdapter::new(registry(), executor);

    adapter
        .save(
            "AppliesTo",
            Record::new().set("AppliesToID", 12).set("Title", "Doors"),
        )
        .await
        .unwrap();

    let calls = adapter.executor().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].0,
        "SET IDENTITY_INSERT [dbo].[AppliesTo] ON;\n\
         INSERT INTO [dbo].[AppliesTo] ([AppliesToID],[Title])\nVALUES ((@id),(@param1));\n\
         SET IDENTITY_INSERT [dbo].[AppliesTo] OFF;\n\
         SELECT @id AS pkid;"
    );
    let names: Vec<&str> = calls[1].1.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["param1", "id"]);
}

#[tokio::test]
async fn test_update_attributes_requires_existing_row() {
    let adapter = MssqlAdapter::new(registry(), ScriptedExecutor::new(vec![Ok(count(0))]));

    let err = adapter
        .update_attributes("AppliesTo", Some(SqlValue::Int(8)), Record::new().set("Title", "x"))
        .await
        .unwrap_err();

    match err {
        AdapterError::NotFound { table, key, id } => {
            assert_eq!(table, "AppliesTo");
            assert_eq!(key, "AppliesToID");
            assert_eq!(id, "8");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(adapter.executor().sql().len(), 1);
}

#[tokio::test]
async fn test_update_attributes_updates_and_mirrors_id() {
    let executor = ScriptedExecutor::new(vec![
        Ok(count(1)),
        Ok(count(1)),
        Ok(vec![Row::new().with("pkid", SqlValue::Int(8))]),
    ]);
    let adapter = MssqlAdapter::new(registry(), executor);

    let updated = adapter
        .update_attributes(
            "AppliesTo",
            Some(SqlValue::Int(8)),
            Record::new().set("Editable", true),
        )
        .await
        .unwrap();

    assert_eq!(updated.get("AppliesToID"), Some(&SqlValue::Int(8)));
    assert_eq!(updated.get("id"), Some(&SqlValue::Int(8)));
    let sql = adapter.executor().sql();
    assert_eq!(
        sql[2],
        "UPDATE [dbo].[AppliesTo]\nSET [Editable]=(1)\nWHERE [AppliesToID] = (@id);\nSELECT @id AS pkid;"
    );
    assert!(sql.iter().all(|s| !s.contains("[id]")));
}

#[tokio::test]
async fn test_find_decodes_row() {
    let executor = ScriptedExecutor::new(vec![Ok(vec![
        Row::new()
            .with("AppliesToID", SqlValue::Int(4))
            .with("Title", SqlValue::Text("Windows".into()))
            .with("Editable", SqlValue::Int(0)),
    ])]);
    let adapter = MssqlAdapter::new(registry(), executor);

    let found = adapter.find("AppliesTo", SqlValue::Int(4)).await.unwrap().unwrap();

    assert_eq!(found.get("Editable"), Some(&SqlValue::Bool(false)));
    assert_eq!(found.get("id"), Some(&SqlValue::Int(4)));
    assert_eq!(
        adapter.executor().sql()[0],
        "SELECT * FROM [dbo].[AppliesTo] WHERE [AppliesToID] = (@id)"
    );
}

#[tokio::test]
async fn test_find_missing_row() {
    let adapter = MssqlAdapter::new(registry(), ScriptedExecutor::new(vec![Ok(Vec::new())]));
    assert!(adapter.find("User", SqlValue::Int(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_count_and_exists() {
    let executor = ScriptedExecutor::new(vec![Ok(count(2)), Ok(count(0))]);
    let adapter = MssqlAdapter::new(registry(), executor);

    let n = adapter
        .count("User", &Where::new().gt("order", 0))
        .await
        .unwrap();
    assert_eq!(n, 2);
    assert!(!adapter.exists("User", SqlValue::Int(1)).await.unwrap());

    let sql = adapter.executor().sql();
    assert_eq!(sql[0], "SELECT COUNT(*) cnt FROM [dbo].[User]\nWHERE [order] > (@param1)");
}

#[tokio::test]
async fn test_destroy_statements() {
    let adapter = MssqlAdapter::new(registry(), ScriptedExecutor::new(Vec::new()));

    adapter.destroy("User", SqlValue::Int(1)).await.unwrap();
    adapter.destroy_all("User").await.unwrap();

    assert_eq!(
        adapter.executor().sql(),
        vec![
            "DELETE FROM [dbo].[User]\nWHERE [id] = (@id)".to_string(),
            "DELETE FROM [dbo].[User]".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_execution_error_carries_statement() {
    let adapter = MssqlAdapter::new(
        registry(),
        ScriptedExecutor::new(vec![Err(ExecutorError::new("Invalid object name 'dbo.User'"))]),
    );

    let err = adapter.destroy_all("User").await.unwrap_err();

    match err {
        AdapterError::Execution { sql, source } => {
            assert_eq!(sql, "DELETE FROM [dbo].[User]");
            assert!(source.to_string().contains("Invalid object name"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unknown_model() {
    let adapter = MssqlAdapter::new(registry(), ScriptedExecutor::new(Vec::new()));
    let err = adapter.count("Ghost", &Where::new()).await.unwrap_err();
    assert!(matches!(err, AdapterError::Compile(_)));
    assert!(adapter.executor().sql().is_empty());
}
