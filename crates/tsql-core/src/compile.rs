//! Value compilation.
//!
//! [`ValueCompiler`] turns one typed value, or the operand of one filter
//! operator, into a SQL fragment. Bound values are appended to the
//! [`Parameters`] passed in; literals never are.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::dialect::{Dialect, MssqlDialect};
use crate::error::{CompileError, Result};
use crate::filter::FilterExpr;
use crate::model::{FieldDef, LogicalType};
use crate::params::Parameters;
use crate::value::SqlValue;

/// Output of value compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// The value was null. Renders as `NULL`; predicates rewrite it to
    /// `IS NULL`.
    Null,
    /// A set operand with no elements. Nothing was bound.
    Empty,
    /// SQL text.
    Sql(String),
}

impl Fragment {
    /// Returns `true` for [`Fragment::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for [`Fragment::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Empty => Ok(()),
            Self::Sql(sql) => f.write_str(sql),
        }
    }
}

/// Compiles values and filter operands into SQL fragments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCompiler<D: Dialect = MssqlDialect> {
    dialect: D,
}

impl ValueCompiler {
    /// Creates a compiler for T-SQL.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dialect: MssqlDialect,
        }
    }
}

impl<D: Dialect> ValueCompiler<D> {
    /// Creates a compiler for the given dialect.
    pub const fn with_dialect(dialect: D) -> Self {
        Self { dialect }
    }

    /// Compiles a single value for `field`.
    ///
    /// Null stays null. JSON and array fields are serialized and bound.
    /// Date fields are normalized to an ISO-8601 string and bound. Boolean
    /// fields become the literal `1` or `0`. Everything else is bound as is.
    pub fn compile(
        &self,
        field: Option<&FieldDef>,
        value: &SqlValue,
        params: &mut Parameters,
    ) -> Result<Fragment> {
        if value.is_null() {
            return Ok(Fragment::Null);
        }
        let Some(field) = field else {
            return Ok(self.bind(value.clone(), params));
        };
        match &field.logical_type {
            LogicalType::Json | LogicalType::Array(_) => {
                let text = serde_json::to_string(&value.to_json())?;
                Ok(self.bind(SqlValue::Text(text), params))
            }
            LogicalType::Date => {
                let ts = coerce_timestamp(&field.name, value)?;
                Ok(self.bind(
                    SqlValue::Text(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
                    params,
                ))
            }
            LogicalType::Boolean => Ok(Fragment::Sql(
                if value.truthy() { "1" } else { "0" }.to_string(),
            )),
            _ => Ok(self.bind(value.clone(), params)),
        }
    }

    /// Compiles the operand side of a filter expression.
    ///
    /// `between` yields `<low> AND <high>`, `inq`/`nin` yield a
    /// comma-separated list (or [`Fragment::Empty`]), and `max` yields the
    /// aggregated column name verbatim.
    pub fn compile_filter(
        &self,
        field: Option<&FieldDef>,
        expr: &FilterExpr,
        params: &mut Parameters,
    ) -> Result<Fragment> {
        match expr {
            FilterExpr::Eq(v)
            | FilterExpr::Gt(v)
            | FilterExpr::Gte(v)
            | FilterExpr::Lt(v)
            | FilterExpr::Lte(v)
            | FilterExpr::Neq(v) => self.compile(field, v, params),
            FilterExpr::Between(low, high) => {
                let low = self.compile(field, low, params)?;
                let high = self.compile(field, high, params)?;
                Ok(Fragment::Sql(format!("{low} AND {high}")))
            }
            FilterExpr::Inq(values) | FilterExpr::Nin(values) => match values {
                SqlValue::List(items) if items.is_empty() => Ok(Fragment::Empty),
                SqlValue::List(items) => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in items {
                        parts.push(self.compile(field, item, params)?.to_string());
                    }
                    Ok(Fragment::Sql(parts.join(",")))
                }
                scalar => Ok(self.bind(scalar.clone(), params)),
            },
            FilterExpr::Max(sub) => Ok(Fragment::Sql(sub.field.clone())),
        }
    }

    fn bind(&self, value: SqlValue, params: &mut Parameters) -> Fragment {
        let name = params.add(value);
        Fragment::Sql(self.dialect.parameter(&name))
    }
}

/// Reads a value as a UTC timestamp.
///
/// Accepts timestamps, RFC 3339 text, `YYYY-MM-DD[ HH:MM:SS[.fff]]` text, and
/// integer or float milliseconds since the Unix epoch.
fn coerce_timestamp(field: &str, value: &SqlValue) -> Result<DateTime<Utc>> {
    let invalid = || CompileError::InvalidDate {
        field: field.to_string(),
        value: value.to_json().to_string(),
    };
    match value {
        SqlValue::Timestamp(ts) => Ok(*ts),
        SqlValue::Text(s) => parse_date_text(s.trim()).ok_or_else(invalid),
        SqlValue::Int(millis) => Utc.timestamp_millis_opt(*millis).single().ok_or_else(invalid),
        #[allow(clippy::cast_possible_truncation)]
        SqlValue::Float(millis) if millis.is_finite() => Utc
            .timestamp_millis_opt(*millis as i64)
            .single()
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn parse_date_text(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
