//! Schema synchronization.
//!
//! The synchronizer walks every registered model, introspects its table,
//! diffs it against the declaration and, depending on the mode, reports or
//! executes the resulting DDL.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};
use tsql_core::{Executor, ExecutorError, ModelDef, Param, Registry, Row};

use crate::dialect::{MigrationDialect, MssqlDdl};
use crate::differ::{SchemaChange, SchemaDiffer, SchemaMismatch};
use crate::error::{MigrateError, Result};
use crate::introspect::Introspector;

/// How far synchronization goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Compute the DDL without executing anything.
    #[default]
    Check,
    /// Create missing tables and alter existing ones.
    Apply,
    /// Drop and recreate every table.
    Rebuild,
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "check" => Ok(Self::Check),
            "apply" => Ok(Self::Apply),
            "rebuild" => Ok(Self::Rebuild),
            other => Err(format!("unknown sync mode '{other}'")),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Check => "check",
            Self::Apply => "apply",
            Self::Rebuild => "rebuild",
        })
    }
}

/// What synchronization does, or would do, to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// The table matches its declaration.
    UpToDate,
    /// The table does not exist and is created.
    Create,
    /// The table exists and is altered.
    Alter,
    /// The table is dropped and recreated.
    Rebuild,
}

/// Outcome for a single model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReport {
    /// Model name.
    pub model: String,
    /// Table name.
    pub table: String,
    /// Action taken or planned.
    pub action: SyncAction,
    /// Changes found by the differ. Empty for create and rebuild.
    pub changes: Vec<SchemaChange>,
    /// DDL statements in execution order.
    pub statements: Vec<String>,
    /// Problems that were reported but not fixed.
    pub mismatches: Vec<SchemaMismatch>,
    /// Whether the statements were executed.
    pub applied: bool,
}

impl ModelReport {
    /// Returns `true` when the table needs DDL.
    #[must_use]
    pub fn changes_needed(&self) -> bool {
        self.action != SyncAction::UpToDate
    }

    /// Returns `true` when the table has problems DDL cannot fix.
    #[must_use]
    pub fn has_mismatches(&self) -> bool {
        !self.mismatches.is_empty()
    }
}

/// Outcome of a synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// One entry per model, sorted by model name.
    pub models: Vec<ModelReport>,
}

impl SyncReport {
    /// Returns `true` if any model needs DDL.
    #[must_use]
    pub fn changes_needed(&self) -> bool {
        self.models.iter().any(ModelReport::changes_needed)
    }

    /// Returns `true` if any table has an unfixable mismatch.
    #[must_use]
    pub fn has_mismatches(&self) -> bool {
        self.models.iter().any(ModelReport::has_mismatches)
    }

    /// Returns `true` if every table matches its declaration. A table with
    /// a mismatch never does, even when no DDL is planned for it.
    #[must_use]
    pub fn is_actual(&self) -> bool {
        !self.changes_needed() && !self.has_mismatches()
    }

    /// Returns every statement of every model, in order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.models
            .iter()
            .flat_map(|m| m.statements.iter().map(String::as_str))
    }

    /// Returns the report for a model.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelReport> {
        self.models.iter().find(|m| m.model == name)
    }
}

/// Brings live tables in line with the registered models.
pub struct SchemaSynchronizer<'a, E, I, D = MssqlDdl> {
    registry: &'a Registry,
    executor: E,
    introspector: I,
    ddl: D,
    differ: SchemaDiffer,
}

impl<'a, E: Executor, I: Introspector> SchemaSynchronizer<'a, E, I, MssqlDdl> {
    /// Creates a synchronizer emitting SQL Server DDL for the registry's
    /// settings.
    pub fn new(registry: &'a Registry, executor: E, introspector: I) -> Self {
        let ddl = MssqlDdl::new(registry.settings().clone());
        Self::with_dialect(registry, executor, introspector, ddl)
    }
}

impl<'a, E: Executor, I: Introspector, D: MigrationDialect> SchemaSynchronizer<'a, E, I, D> {
    /// Creates a synchronizer with an explicit DDL dialect.
    pub const fn with_dialect(registry: &'a Registry, executor: E, introspector: I, ddl: D) -> Self {
        Self {
            registry,
            executor,
            introspector,
            ddl,
            differ: SchemaDiffer::new(),
        }
    }

    /// Returns the DDL dialect.
    pub const fn dialect(&self) -> &D {
        &self.ddl
    }

    /// Synchronizes every model.
    ///
    /// Models are independent tables and run concurrently. A failing model
    /// does not stop the others; once all have finished the first error is
    /// returned.
    pub async fn synchronize(&self, mode: SyncMode) -> Result<SyncReport> {
        info!(mode = %mode, dialect = self.ddl.name(), "Synchronizing schema");
        let results = join_all(self.registry.models().map(|m| self.sync_model(m, mode))).await;

        let mut models = Vec::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(report) => models.push(report),
                Err(err) => {
                    warn!(error = %err, "Model synchronization failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        Ok(SyncReport { models })
    }

    /// Returns `true` if no table needs DDL or has a mismatch.
    pub async fn is_actual(&self) -> Result<bool> {
        Ok(self.synchronize(SyncMode::Check).await?.is_actual())
    }

    /// Creates every table that does not exist yet.
    pub async fn create_all(&self) -> Result<()> {
        for model in self.registry.models() {
            self.run(model, &self.ddl.create_table_sql(model)).await?;
        }
        Ok(())
    }

    /// Drops every table that exists.
    pub async fn drop_all(&self) -> Result<()> {
        for model in self.registry.models() {
            self.run(model, &self.ddl.drop_table_sql(model)).await?;
        }
        Ok(())
    }

    async fn sync_model(&self, model: &ModelDef, mode: SyncMode) -> Result<ModelReport> {
        let table = model.table_name();
        let mut report = ModelReport {
            model: model.name.clone(),
            table: table.clone(),
            action: SyncAction::UpToDate,
            changes: Vec::new(),
            statements: Vec::new(),
            mismatches: Vec::new(),
            applied: false,
        };

        if mode == SyncMode::Rebuild {
            info!(model = %model.name, table = %table, "Rebuilding table");
            report.action = SyncAction::Rebuild;
            report.statements = vec![self.ddl.drop_table_sql(model), self.ddl.create_table_sql(model)];
            self.run_all(model, &report.statements).await?;
            report.applied = true;
            return Ok(report);
        }

        let columns = self.introspector.columns_of(&table).await?;
        if columns.is_empty() {
            info!(model = %model.name, table = %table, "Table is missing");
            report.action = SyncAction::Create;
            report.statements = vec![self.ddl.create_table_sql(model)];
        } else {
            let indexes = self.introspector.indexes_of(&table).await?;
            let diff = self.differ.diff(model, &columns, &indexes);
            for mismatch in &diff.mismatches {
                warn!(model = %model.name, table = %table, "{}", mismatch.message);
            }
            if !diff.is_empty() {
                info!(
                    model = %model.name,
                    table = %table,
                    changes = diff.changes.len(),
                    "Table needs alteration"
                );
                report.action = SyncAction::Alter;
                report.statements = self.ddl.changes_sql(model, &diff.changes).into_iter().collect();
            } else {
                debug!(model = %model.name, table = %table, "Table is up to date");
            }
            report.changes = diff.changes;
            report.mismatches = diff.mismatches;
        }

        if mode == SyncMode::Apply && !report.statements.is_empty() {
            self.run_all(model, &report.statements).await?;
            report.applied = true;
        }
        Ok(report)
    }

    async fn run_all(&self, model: &ModelDef, statements: &[String]) -> Result<()> {
        // Statements touching one table run strictly in order.
        for sql in statements {
            self.run(model, sql).await?;
        }
        Ok(())
    }

    async fn run(&self, model: &ModelDef, sql: &str) -> Result<()> {
        debug!(model = %model.name, sql = %sql, "Executing DDL");
        self.executor
            .execute(sql, &[])
            .await
            .map(|_| ())
            .map_err(|source| MigrateError::Execution {
                table: model.table_name(),
                sql: sql.to_string(),
                source,
            })
    }
}

/// Executor that records statements instead of running them.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    statements: Mutex<Vec<String>>,
}

impl DryRunExecutor {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the statements seen so far.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Executor for DryRunExecutor {
    async fn execute(&self, sql: &str, _params: &[Param]) -> std::result::Result<Vec<Row>, ExecutorError> {
        info!("[DRY RUN] {sql}");
        self.statements
            .lock()
            .map_err(|_| ExecutorError::new("dry-run recorder is poisoned"))?
            .push(sql.to_string());
        Ok(Vec::new())
    }
}
