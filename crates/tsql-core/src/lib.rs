//! # tsql-core
//!
//! Compiles model-driven data operations into parameterized T-SQL.
//!
//! This crate provides:
//! - Model declarations and a registry that resolves primary keys
//! - A value compiler with per-type binding rules (JSON, Date, Boolean)
//! - Filter expressions with a closed operator set, compiled to WHERE clauses
//! - Statement builders for insert, upsert, update, select, count and delete
//! - The [`Executor`] seam through which compiled statements are run
//!
//! Compilation is pure. Each call fills its own [`Parameters`], so builders
//! can be shared freely across threads.
//!
//! ## Example
//!
//! ```rust
//! use tsql_core::{FieldDef, ModelDef, Registry, SelectQuery, StatementBuilder, Where};
//!
//! let mut registry = Registry::new();
//! registry
//!     .define(
//!         ModelDef::new("User")
//!             .field(FieldDef::string("name").limit(100))
//!             .field(FieldDef::number("order").indexed()),
//!     )
//!     .unwrap();
//!
//! let query = SelectQuery::new()
//!     .filter(Where::new().inq("name", vec!["John Lennon", "Paul McCartney"]));
//! let stmt = StatementBuilder::new(&registry).select("User", &query).unwrap();
//!
//! assert_eq!(
//!     stmt.sql,
//!     "SELECT * FROM [dbo].[User]\nWHERE [name] IN (@param1,@param2)"
//! );
//! assert_eq!(stmt.params.len(), 2);
//! ```

pub mod compile;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod filter;
pub mod model;
pub mod params;
pub mod predicate;
pub mod record;
pub mod statement;
pub mod value;

pub use compile::{Fragment, ValueCompiler};
pub use dialect::{Dialect, MssqlDialect};
pub use error::{CompileError, Result};
pub use executor::{Executor, ExecutorError, Row};
pub use filter::{FilterExpr, FilterOp, MaxSubquery, Where};
pub use model::{
    AdapterSettings, Direction, FieldDef, FieldIndex, IndexColumn, IndexKind, IndexSpec,
    LogicalType, ModelDef, Registry,
};
pub use params::{Param, Parameters};
pub use predicate::PredicateCompiler;
pub use record::Record;
pub use statement::{Batch, CompiledStatement, OrderBy, SelectQuery, StatementBuilder, UpsertPlan};
pub use value::{SqlValue, ToSqlValue};

/// Derive macro generating [`ModelDef`] declarations from structs.
pub use tsql_derive::Model;

/// Implemented by types that describe a persisted model.
///
/// Usually derived with `#[derive(Model)]`.
pub trait Model {
    /// Logical model name.
    const NAME: &'static str;

    /// Returns the model declaration.
    fn model_def() -> ModelDef;
}
