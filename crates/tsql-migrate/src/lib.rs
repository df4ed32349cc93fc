//! Schema synchronization for SQL Server.
//!
//! `tsql-migrate` keeps live tables in line with the models registered in a
//! [`tsql_core::Registry`]:
//! - Missing tables are created together with their indexes
//! - Existing tables are diffed column by column and index by index
//! - Rebuild mode drops and recreates every table
//!
//! # Architecture
//!
//! - **Introspector** - Reads live columns and indexes (catalog or snapshot)
//! - **Differ** - Compares a model with introspected facts
//! - **Dialect** - Renders changes and table creation as T-SQL
//! - **Synchronizer** - Runs the above per model and executes the DDL
//!
//! # Example
//!
//! ```rust
//! use tsql_core::{FieldDef, ModelDef, Registry};
//! use tsql_migrate::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let mut registry = Registry::new();
//! registry
//!     .define(ModelDef::new("User").field(FieldDef::string("email").limit(100).indexed()))
//!     .unwrap();
//!
//! let executor = DryRunExecutor::new();
//! let sync = SchemaSynchronizer::new(&registry, &executor, SnapshotIntrospector::new());
//! let report = sync.synchronize(SyncMode::Check).await.unwrap();
//!
//! assert_eq!(report.model("User").unwrap().action, SyncAction::Create);
//! assert!(executor.statements().is_empty());
//! # });
//! ```

pub mod dialect;
pub mod differ;
pub mod error;
pub mod introspect;
pub mod schema_file;
pub mod sync;
pub mod types;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{MigrationDialect, MssqlDdl};
    pub use crate::differ::{SchemaChange, SchemaDiffer, SchemaMismatch, TableDiff};
    pub use crate::error::{MigrateError, Result};
    pub use crate::introspect::{
        ActualColumn, ActualIndex, CatalogIntrospector, Introspector, SnapshotIntrospector,
        TableSnapshot,
    };
    pub use crate::schema_file::SchemaFile;
    pub use crate::sync::{
        DryRunExecutor, ModelReport, SchemaSynchronizer, SyncAction, SyncMode, SyncReport,
    };
    pub use crate::types::DatatypeMapper;
}
