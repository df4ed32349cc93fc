//! Statement assembly.
//!
//! [`StatementBuilder`] produces complete statement text plus bound
//! parameters for every data operation. Nothing here performs I/O.

use std::sync::OnceLock;

use regex::Regex;

use crate::compile::ValueCompiler;
use crate::dialect::{Dialect, MssqlDialect};
use crate::error::{CompileError, Result};
use crate::filter::Where;
use crate::model::{Direction, ModelDef, Registry};
use crate::params::{Param, Parameters};
use crate::predicate::PredicateCompiler;
use crate::record::Record;
use crate::value::SqlValue;

/// Name of the parameter carrying a primary-key value.
pub const ID_PARAM: &str = "id";

/// Statement text with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    /// SQL text.
    pub sql: String,
    /// Bound parameters, in binding order.
    pub params: Parameters,
}

impl CompiledStatement {
    /// Creates a statement with no parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Parameters::new(),
        }
    }
}

/// Several statements that must run as one round trip, sharing one set of
/// parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    statements: Vec<String>,
    params: Parameters,
}

impl Batch {
    /// Creates an empty batch over the given parameters.
    #[must_use]
    pub const fn new(params: Parameters) -> Self {
        Self {
            statements: Vec::new(),
            params,
        }
    }

    /// Appends a statement (without its terminating semicolon).
    #[must_use]
    pub fn statement(mut self, sql: impl Into<String>) -> Self {
        self.statements.push(sql.into());
        self
    }

    /// Returns the statements in execution order.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Returns the shared parameters.
    #[must_use]
    pub const fn params(&self) -> &Parameters {
        &self.params
    }

    /// Returns `true` when the batch holds no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Joins the statements into one text, each terminated by `;`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.statements
            .iter()
            .map(|s| format!("{s};"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Converts the batch into a single statement.
    #[must_use]
    pub fn into_statement(self) -> CompiledStatement {
        CompiledStatement {
            sql: self.to_sql(),
            params: self.params,
        }
    }
}

/// What an upsert should do.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertPlan {
    /// No usable primary-key value: insert and let the server assign one.
    Insert(CompiledStatement),
    /// A primary-key value was supplied. Run `exists`; on a positive count
    /// run `update`, otherwise run the identity-insert batch.
    Keyed {
        /// The supplied primary-key value.
        id: SqlValue,
        /// `SELECT COUNT(*) cnt ...` for the key.
        exists: CompiledStatement,
        /// Update of the existing row.
        update: CompiledStatement,
        /// Insert that supplies the key explicitly.
        insert: Batch,
    },
}

/// One parsed ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column name, unquoted.
    pub column: String,
    /// Explicit direction, if one was written.
    pub direction: Option<Direction>,
}

fn order_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)^(.*?)(?:\s+(asc|desc))?$").expect("order pattern is valid")
    })
}

impl OrderBy {
    /// Parses `"column"`, `"column ASC"` or `"column DESC"`.
    ///
    /// Everything before the optional direction is the column name, so
    /// names containing spaces or punctuation are accepted. A name wrapped
    /// in brackets is unwrapped before being quoted again.
    pub fn parse(term: &str) -> Result<Self> {
        let invalid = || CompileError::InvalidOrder(term.to_string());
        let caps = order_pattern().captures(term.trim()).ok_or_else(invalid)?;
        let raw = caps.get(1).map_or("", |m| m.as_str().trim());
        if raw.eq_ignore_ascii_case("asc") || raw.eq_ignore_ascii_case("desc") {
            return Err(invalid());
        }
        let column = match raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            Some(inner) => inner.replace("]]", "]"),
            None => raw.to_string(),
        };
        if column.trim().is_empty() {
            return Err(invalid());
        }
        let direction = caps.get(2).map(|m| m.as_str().parse()).transpose()?;
        Ok(Self { column, direction })
    }

    /// Renders the term with the column quoted independently of the
    /// direction.
    pub fn to_sql<D: Dialect>(&self, dialect: &D) -> String {
        let column = dialect.quote_identifier(&self.column);
        match self.direction {
            Some(direction) => format!("{column} {direction}"),
            None => column,
        }
    }
}

/// Filter, ordering and paging for a SELECT.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    /// Row filter.
    pub filter: Where,
    /// ORDER BY terms, e.g. `"name DESC"`.
    pub order: Vec<String>,
    /// Rows to skip.
    pub skip: Option<u64>,
    /// Maximum rows to return.
    pub limit: Option<u64>,
}

impl SelectQuery {
    /// Creates an unfiltered, unordered query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = filter;
        self
    }

    /// Appends ORDER BY terms. A comma-separated list is split into terms.
    #[must_use]
    pub fn order(mut self, terms: &str) -> Self {
        self.order.extend(
            terms
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from),
        );
        self
    }

    /// Sets the number of rows to skip.
    #[must_use]
    pub const fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sets the maximum number of rows.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn paged(&self) -> bool {
        self.skip.is_some_and(|n| n > 0) || self.limit.is_some_and(|n| n > 0)
    }
}

/// Builds statements for models held in a [`Registry`].
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    registry: &'a Registry,
    dialect: MssqlDialect,
    values: ValueCompiler,
    predicates: PredicateCompiler,
}

impl<'a> StatementBuilder<'a> {
    /// Creates a builder over the given registry.
    #[must_use]
    pub const fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            dialect: MssqlDialect,
            values: ValueCompiler::new(),
            predicates: PredicateCompiler::new(),
        }
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Returns the schema-qualified, quoted table of a model.
    #[must_use]
    pub fn table(&self, model: &ModelDef) -> String {
        self.dialect
            .qualified_table(&self.registry.settings().schema, &model.table_name())
    }

    fn pk(&self, model: &ModelDef) -> String {
        self.dialect.quote_identifier(model.primary_key())
    }

    /// Reads the primary-key value out of a record, by storage name first
    /// and then by the key field's own name.
    #[must_use]
    pub fn primary_key_value<'r>(model: &ModelDef, record: &'r Record) -> Option<&'r SqlValue> {
        record.get(model.primary_key()).or_else(|| {
            model
                .fields
                .iter()
                .filter(|f| f.primary_key)
                .find_map(|f| record.get(&f.name))
        })
    }

    /// Compiles the assignable fields of a record, skipping the primary key
    /// and anything the model does not declare.
    fn assignments(
        &self,
        model: &ModelDef,
        record: &Record,
        params: &mut Parameters,
    ) -> Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        for (key, value) in record.iter() {
            if model.is_primary_key(key) {
                continue;
            }
            let Some(field) = model.field_def(key) else {
                continue;
            };
            let fragment = self.values.compile(Some(field), value, params)?;
            out.push((self.dialect.quote_identifier(key), format!("({fragment})")));
        }
        Ok(out)
    }

    /// Plain insert followed by retrieval of the generated identity.
    pub fn insert(&self, model: &str, record: &Record) -> Result<CompiledStatement> {
        let model = self.registry.model(model)?;
        let mut params = Parameters::new();
        let assignments = self.assignments(model, record, &mut params)?;
        Ok(CompiledStatement {
            sql: self.insert_sql(model, &assignments),
            params,
        })
    }

    fn insert_sql(&self, model: &ModelDef, assignments: &[(String, String)]) -> String {
        let table = self.table(model);
        let nl = self.dialect.clause_separator();
        let insert = if assignments.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES;")
        } else {
            let (columns, values): (Vec<&str>, Vec<&str>) = assignments
                .iter()
                .map(|(c, v)| (c.as_str(), v.as_str()))
                .unzip();
            format!(
                "INSERT INTO {table} ({}){nl}VALUES ({});",
                columns.join(","),
                values.join(",")
            )
        };
        format!("{insert}{nl}SELECT CAST(SCOPE_IDENTITY() AS int) AS insertId;")
    }

    /// Plans an update-or-insert keyed by the resolved primary key.
    ///
    /// A missing, non-numeric or non-positive key yields a plain insert.
    pub fn upsert(&self, model: &str, record: &Record) -> Result<UpsertPlan> {
        let model_def = self.registry.model(model)?;
        let id = Self::primary_key_value(model_def, record)
            .filter(|v| v.as_i64().is_some_and(|n| n > 0))
            .cloned();
        let Some(id) = id else {
            return self.insert(model, record).map(UpsertPlan::Insert);
        };

        let mut params = Parameters::new();
        let assignments = self.assignments(model_def, record, &mut params)?;
        let table = self.table(model_def);
        let pk = self.pk(model_def);

        let mut update_params = params.clone();
        update_params.add_named(ID_PARAM, id.clone());
        let update = CompiledStatement {
            sql: self.update_sql(model_def, &assignments),
            params: update_params,
        };

        let mut insert_params = params;
        insert_params.add_named(ID_PARAM, id.clone());
        let mut columns = vec![pk];
        let mut values = vec![format!("({})", self.dialect.parameter(ID_PARAM))];
        for (c, v) in assignments {
            columns.push(c);
            values.push(v);
        }
        let insert = Batch::new(insert_params)
            .statement(format!("SET IDENTITY_INSERT {table} ON"))
            .statement(format!(
                "INSERT INTO {table} ({}){}VALUES ({})",
                columns.join(","),
                self.dialect.clause_separator(),
                values.join(",")
            ))
            .statement(format!("SET IDENTITY_INSERT {table} OFF"))
            .statement(format!("SELECT {} AS pkid", self.dialect.parameter(ID_PARAM)));

        Ok(UpsertPlan::Keyed {
            exists: self.exists_for(model_def, id.clone()),
            id,
            update,
            insert,
        })
    }

    fn update_sql(&self, model: &ModelDef, assignments: &[(String, String)]) -> String {
        let nl = self.dialect.clause_separator();
        let id = self.dialect.parameter(ID_PARAM);
        let select = format!("SELECT {id} AS pkid;");
        if assignments.is_empty() {
            return select;
        }
        let set: Vec<String> = assignments.iter().map(|(c, v)| format!("{c}={v}")).collect();
        format!(
            "UPDATE {}{nl}SET {}{nl}WHERE {} = ({id});{nl}{select}",
            self.table(model),
            set.join(","),
            self.pk(model),
        )
    }

    /// Updates the row with the given key. The caller is expected to have
    /// checked existence first.
    pub fn update(&self, model: &str, id: &SqlValue, record: &Record) -> Result<CompiledStatement> {
        let model = self.registry.model(model)?;
        let mut params = Parameters::new();
        let assignments = self.assignments(model, record, &mut params)?;
        params.add_named(ID_PARAM, id.clone());
        Ok(CompiledStatement {
            sql: self.update_sql(model, &assignments),
            params,
        })
    }

    /// `SELECT * ...` with optional filter, ordering and paging.
    ///
    /// Paging without an explicit order sorts by the primary key.
    pub fn select(&self, model: &str, query: &SelectQuery) -> Result<CompiledStatement> {
        let model = self.registry.model(model)?;
        let nl = self.dialect.clause_separator();
        let mut params = Parameters::new();
        let mut sql = format!("SELECT * FROM {}", self.table(model));

        if let Some(clause) = self.predicates.where_clause(&query.filter, model, &mut params)? {
            sql.push_str(nl);
            sql.push_str(&clause);
        }

        let mut order = query
            .order
            .iter()
            .map(|t| OrderBy::parse(t))
            .collect::<Result<Vec<_>>>()?;
        if order.is_empty() && query.paged() {
            order.push(OrderBy {
                column: model.primary_key().to_string(),
                direction: None,
            });
        }
        if !order.is_empty() {
            let terms: Vec<String> = order.iter().map(|o| o.to_sql(&self.dialect)).collect();
            sql.push_str(nl);
            sql.push_str(&format!(
                "ORDER BY {} OFFSET {} ROWS",
                terms.join(","),
                query.skip.unwrap_or(0)
            ));
            if let Some(limit) = query.limit.filter(|n| *n > 0) {
                sql.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
            }
        }

        Ok(CompiledStatement { sql, params })
    }

    /// `SELECT COUNT(*) cnt ...` with an optional filter.
    pub fn count(&self, model: &str, filter: &Where) -> Result<CompiledStatement> {
        let model = self.registry.model(model)?;
        let mut params = Parameters::new();
        let mut sql = format!("SELECT COUNT(*) cnt FROM {}", self.table(model));
        if let Some(clause) = self.predicates.where_clause(filter, model, &mut params)? {
            sql.push_str(self.dialect.clause_separator());
            sql.push_str(&clause);
        }
        Ok(CompiledStatement { sql, params })
    }

    /// Counts rows with the given key.
    pub fn exists(&self, model: &str, id: SqlValue) -> Result<CompiledStatement> {
        let model = self.registry.model(model)?;
        Ok(self.exists_for(model, id))
    }

    fn exists_for(&self, model: &ModelDef, id: SqlValue) -> CompiledStatement {
        CompiledStatement {
            sql: format!(
                "SELECT COUNT(*) cnt FROM {} WHERE {} = ({})",
                self.table(model),
                self.pk(model),
                self.dialect.parameter(ID_PARAM)
            ),
            params: Parameters::seeded(vec![Param::new(ID_PARAM, id)]),
        }
    }

    /// Fetches the row with the given key.
    pub fn find(&self, model: &str, id: SqlValue) -> Result<CompiledStatement> {
        let model = self.registry.model(model)?;
        Ok(CompiledStatement {
            sql: format!(
                "SELECT * FROM {} WHERE {} = ({})",
                self.table(model),
                self.pk(model),
                self.dialect.parameter(ID_PARAM)
            ),
            params: Parameters::seeded(vec![Param::new(ID_PARAM, id)]),
        })
    }

    /// Deletes the row with the given key, or every row when `id` is `None`.
    pub fn delete(&self, model: &str, id: Option<SqlValue>) -> Result<CompiledStatement> {
        let model = self.registry.model(model)?;
        let table = self.table(model);
        Ok(match id {
            Some(id) => CompiledStatement {
                sql: format!(
                    "DELETE FROM {table}{}WHERE {} = ({})",
                    self.dialect.clause_separator(),
                    self.pk(model),
                    self.dialect.parameter(ID_PARAM)
                ),
                params: Parameters::seeded(vec![Param::new(ID_PARAM, id)]),
            },
            None => CompiledStatement::new(format!("DELETE FROM {table}")),
        })
    }
}
