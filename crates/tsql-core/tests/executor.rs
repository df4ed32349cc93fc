//! Running compiled statements through the `Executor` seam.

mod common;

use std::sync::Arc;

use common::{registry, RecordingExecutor};
use tsql_core::{Executor, Record, Row, SqlValue, StatementBuilder, UpsertPlan};

#[tokio::test]
async fn test_run_passes_sql_and_params() {
    let registry = registry();
    let executor = RecordingExecutor::returning(vec![Row::new().with("cnt", SqlValue::Int(1))]);
    let stmt = StatementBuilder::new(&registry)
        .exists("User", SqlValue::Int(3))
        .unwrap();

    let rows = executor.run(&stmt).await.unwrap();
    assert_eq!(rows[0].get_i64("cnt"), Some(1));

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, stmt.sql);
    assert_eq!(calls[0].1[0].name, "id");
}

#[tokio::test]
async fn test_identity_insert_is_one_round_trip() {
    let registry = registry();
    let executor = Arc::new(RecordingExecutor::default());
    let record = Record::new().set("id", 9).set("name", "Ringo Starr");
    let UpsertPlan::Keyed { insert, .. } = StatementBuilder::new(&registry)
        .upsert("User", &record)
        .unwrap()
    else {
        panic!("expected a keyed upsert");
    };

    executor.execute_batch(&insert).await.unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    let (sql, params) = &calls[0];
    assert!(sql.starts_with("SET IDENTITY_INSERT [dbo].[User] ON;"));
    assert!(sql.contains("SET IDENTITY_INSERT [dbo].[User] OFF;"));
    assert_eq!(params.len(), 2);
}
