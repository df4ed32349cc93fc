//! # tsql-adapter
//!
//! A thin persistence adapter that compiles data operations with
//! [`tsql_core`] and runs them through an [`Executor`](tsql_core::Executor).
//!
//! Rows coming back are decoded into [`Record`](tsql_core::Record)s: Boolean
//! fields are turned back into booleans and the primary key is mirrored
//! into `id` for models that name their key differently.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tsql_adapter::MssqlAdapter;
//! use tsql_core::{FieldDef, ModelDef, Record, Registry, SelectQuery, Where};
//!
//! let mut registry = Registry::new();
//! registry.define(ModelDef::new("User").field(FieldDef::string("name").limit(100)))?;
//! let adapter = MssqlAdapter::new(registry, executor);
//!
//! let id = adapter.create("User", &Record::new().set("name", "John Lennon")).await?;
//! let beatles = adapter
//!     .all("User", &SelectQuery::new().filter(Where::new().inq("name", vec!["John Lennon"])))
//!     .await?;
//! ```

pub mod adapter;
pub mod error;

pub use adapter::{MssqlAdapter, decode_row};
pub use error::{AdapterError, Result};
