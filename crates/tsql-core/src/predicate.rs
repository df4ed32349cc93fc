//! WHERE clause compilation.

use crate::compile::{Fragment, ValueCompiler};
use crate::dialect::{Dialect, MssqlDialect};
use crate::error::Result;
use crate::filter::{FilterExpr, FilterOp, MaxSubquery, Where};
use crate::model::ModelDef;
use crate::params::Parameters;

/// Compiles a [`Where`] into the body of a WHERE clause.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateCompiler<D: Dialect = MssqlDialect> {
    dialect: D,
    values: ValueCompiler<D>,
}

impl PredicateCompiler {
    /// Creates a compiler for T-SQL.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dialect: MssqlDialect,
            values: ValueCompiler::new(),
        }
    }
}

impl<D: Dialect + Copy> PredicateCompiler<D> {
    /// Creates a compiler for the given dialect.
    pub const fn with_dialect(dialect: D) -> Self {
        Self {
            dialect,
            values: ValueCompiler::with_dialect(dialect),
        }
    }

    /// Compiles every condition and joins them with ` AND `.
    ///
    /// Returns an empty string for an empty filter; the `WHERE` keyword is
    /// never emitted here.
    pub fn compile(
        &self,
        filter: &Where,
        model: &ModelDef,
        params: &mut Parameters,
    ) -> Result<String> {
        let mut parts = Vec::with_capacity(filter.conditions().len());
        for (field, expr) in filter.conditions() {
            parts.push(self.condition(field, expr, model, params)?);
        }
        Ok(parts.join(" AND "))
    }

    /// Compiles the filter and prefixes `WHERE`, or returns `None` when
    /// there is nothing to filter on.
    pub fn where_clause(
        &self,
        filter: &Where,
        model: &ModelDef,
        params: &mut Parameters,
    ) -> Result<Option<String>> {
        let body = self.compile(filter, model, params)?;
        Ok((!body.is_empty()).then(|| format!("WHERE {body}")))
    }

    fn condition(
        &self,
        field: &str,
        expr: &FilterExpr,
        model: &ModelDef,
        params: &mut Parameters,
    ) -> Result<String> {
        let key = self.dialect.quote_identifier(field);
        let def = model.field_def(field);

        if let FilterExpr::Max(sub) = expr {
            return self.max_subquery(&key, sub, model, params);
        }

        let value = self.values.compile_filter(def, expr, params)?;
        let Some(op) = expr.op() else {
            return Ok(if value.is_null() {
                format!("{key} IS NULL")
            } else {
                format!("{key} = ({value})")
            });
        };

        Ok(match (op, &value) {
            (FilterOp::Inq, Fragment::Empty) => "0=1".to_string(),
            (FilterOp::Nin, Fragment::Empty) => "0=0".to_string(),
            (FilterOp::Neq, Fragment::Null) => format!("{key} IS NOT NULL"),
            (FilterOp::Inq, _) => format!("{key} IN ({value})"),
            (FilterOp::Nin, _) => format!("{key} NOT IN ({value})"),
            (FilterOp::Between, _) => format!("{key} BETWEEN {value}"),
            (op, _) => {
                let token = op.sql_token().unwrap_or("=");
                format!("{key} {token} ({value})")
            }
        })
    }

    fn max_subquery(
        &self,
        key: &str,
        sub: &MaxSubquery,
        model: &ModelDef,
        params: &mut Parameters,
    ) -> Result<String> {
        let mut sql = format!("{key} = (SELECT MAX({}) FROM {}", sub.field, sub.from);
        if let Some(nested) = &sub.filter {
            if let Some(clause) = self.where_clause(nested, model, params)? {
                sql.push(' ');
                sql.push_str(&clause);
            }
        }
        sql.push(')');
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldDef;
    use crate::value::SqlValue;

    fn user() -> ModelDef {
        ModelDef::new("User")
            .field(FieldDef::string("name").limit(100))
            .field(FieldDef::string("email").limit(100).indexed())
            .field(FieldDef::number("order").indexed())
            .field(FieldDef::boolean("active"))
    }

    fn compile(filter: &Where) -> (String, Parameters) {
        let mut params = Parameters::new();
        let sql = PredicateCompiler::new()
            .compile(filter, &user(), &mut params)
            .unwrap();
        (sql, params)
    }

    #[test]
    fn test_inq_over_two_names() {
        let (sql, params) = compile(&Where::new().inq("name", vec!["John Lennon", "Paul McCartney"]));
        assert_eq!(sql, "[name] IN (@param1,@param2)");
        assert_eq!(params.get("param1"), Some(&SqlValue::Text("John Lennon".into())));
        assert_eq!(params.get("param2"), Some(&SqlValue::Text("Paul McCartney".into())));
    }

    #[test]
    fn test_empty_sets() {
        let (sql, params) = compile(
            &Where::new()
                .inq("name", Vec::<String>::new())
                .nin("email", Vec::<String>::new()),
        );
        assert_eq!(sql, "0=1 AND 0=0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_null_and_equality() {
        let (sql, params) = compile(&Where::new().is_null("email").eq("name", "Ringo Starr"));
        assert_eq!(sql, "[email] IS NULL AND [name] = (@param1)");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_comparisons() {
        let (sql, _) = compile(
            &Where::new()
                .gt("order", 1)
                .gte("order", 2)
                .lt("order", 3)
                .lte("order", 4)
                .neq("name", "x"),
        );
        assert_eq!(
            sql,
            "[order] > (@param1) AND [order] >= (@param2) AND [order] < (@param3) \
             AND [order] <= (@param4) AND [name] != (@param5)"
        );
    }

    #[test]
    fn test_neq_null() {
        let (sql, params) = compile(&Where::new().neq("email", SqlValue::Null));
        assert_eq!(sql, "[email] IS NOT NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_between() {
        let (sql, params) = compile(&Where::new().between("order", 1, 3));
        assert_eq!(sql, "[order] BETWEEN @param1 AND @param2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_boolean_literal() {
        let (sql, params) = compile(&Where::new().eq("active", true));
        assert_eq!(sql, "[active] = (1)");
        assert!(params.is_empty());
    }

    #[test]
    fn test_max_subquery_shares_parameters() {
        let sub = MaxSubquery::new("[order]", "[dbo].[User]").filter(Where::new().eq("name", "George"));
        let (sql, params) = compile(&Where::new().eq("email", "g@x").max("order", sub));
        assert_eq!(
            sql,
            "[email] = (@param1) AND [order] = (SELECT MAX([order]) FROM [dbo].[User] WHERE [name] = (@param2))"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_empty_filter() {
        let mut params = Parameters::new();
        let clause = PredicateCompiler::new()
            .where_clause(&Where::new(), &user(), &mut params)
            .unwrap();
        assert!(clause.is_none());
    }
}
