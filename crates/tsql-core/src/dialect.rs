//! SQL dialect support.
//!
//! Identifier quoting and name escaping are driven by the [`Dialect`] trait so
//! that statement builders never hard-code delimiter characters.

/// Trait for SQL dialect-specific behavior.
pub trait Dialect {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the opening and closing identifier delimiters.
    fn identifier_quotes(&self) -> (char, char) {
        ('"', '"')
    }

    /// Returns the parameter prefix used to reference a named parameter.
    fn parameter_prefix(&self) -> char {
        '@'
    }

    /// Separator placed between the clauses of one statement.
    fn clause_separator(&self) -> &'static str {
        "\n"
    }

    /// Quotes an identifier, doubling any embedded closing delimiter.
    fn quote_identifier(&self, name: &str) -> String {
        let (open, close) = self.identifier_quotes();
        let doubled: String = [close, close].iter().collect();
        let escaped = name.replace(close, &doubled);
        format!("{open}{escaped}{close}")
    }

    /// Returns a schema-qualified, quoted table reference.
    fn qualified_table(&self, schema: &str, table: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(schema),
            self.quote_identifier(table)
        )
    }

    /// Returns the reference to a named parameter, e.g. `@param1`.
    fn parameter(&self, name: &str) -> String {
        format!("{}{name}", self.parameter_prefix())
    }

    /// Turns a model or table name into a storable table name.
    fn escape_name(&self, name: &str) -> String {
        name.replace('.', "_")
    }
}

/// Microsoft SQL Server (T-SQL).
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDialect;

impl Dialect for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('[', ']')
    }
}
