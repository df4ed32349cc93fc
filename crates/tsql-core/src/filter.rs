//! Filter expressions.
//!
//! Filters are parsed once, at the API boundary, into a [`Where`] made of
//! `(field, FilterExpr)` pairs. Compilation never inspects raw JSON.

use std::fmt;
use std::str::FromStr;

use serde_json::Value as JsonValue;

use crate::error::{CompileError, Result};
use crate::model::ModelDef;
use crate::value::{SqlValue, ToSqlValue};

/// The closed set of filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Inclusive range.
    Between,
    /// Set membership.
    Inq,
    /// Set exclusion.
    Nin,
    /// Not equal.
    Neq,
    /// Equality against a correlated `MAX` subquery.
    Max,
}

impl FilterOp {
    /// Returns the operator name as written in filter documents.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Between => "between",
            Self::Inq => "inq",
            Self::Nin => "nin",
            Self::Neq => "neq",
            Self::Max => "max",
        }
    }

    /// Returns the SQL operator token. `max` has none; it renders as a
    /// subquery comparison.
    #[must_use]
    pub const fn sql_token(self) -> Option<&'static str> {
        match self {
            Self::Gt => Some(">"),
            Self::Gte => Some(">="),
            Self::Lt => Some("<"),
            Self::Lte => Some("<="),
            Self::Between => Some("BETWEEN"),
            Self::Inq => Some("IN"),
            Self::Nin => Some("NOT IN"),
            Self::Neq => Some("!="),
            Self::Max => None,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterOp {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "between" => Ok(Self::Between),
            "inq" => Ok(Self::Inq),
            "nin" => Ok(Self::Nin),
            "neq" => Ok(Self::Neq),
            "max" => Ok(Self::Max),
            other => Err(CompileError::UnsupportedOperator(other.to_string())),
        }
    }
}

/// Descriptor of a correlated `MAX` subquery.
#[derive(Debug, Clone, PartialEq)]
pub struct MaxSubquery {
    /// Aggregated column, emitted verbatim.
    pub field: String,
    /// Source table reference, emitted verbatim.
    pub from: String,
    /// Optional nested filter.
    pub filter: Option<Box<Where>>,
}

impl MaxSubquery {
    /// Creates a subquery over `from` aggregating `field`.
    #[must_use]
    pub fn new(field: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            from: from.into(),
            filter: None,
        }
    }

    /// Adds a nested filter.
    #[must_use]
    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }
}

/// A filter on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Equality, or `IS NULL` when the value is null.
    Eq(SqlValue),
    /// `> value`.
    Gt(SqlValue),
    /// `>= value`.
    Gte(SqlValue),
    /// `< value`.
    Lt(SqlValue),
    /// `<= value`.
    Lte(SqlValue),
    /// `!= value`.
    Neq(SqlValue),
    /// `BETWEEN low AND high`.
    Between(SqlValue, SqlValue),
    /// `IN (...)`; a non-list operand is bound as a single parameter.
    Inq(SqlValue),
    /// `NOT IN (...)`; a non-list operand is bound as a single parameter.
    Nin(SqlValue),
    /// `= (SELECT MAX(...) ...)`.
    Max(MaxSubquery),
}

impl FilterExpr {
    /// Returns the operator, or `None` for plain equality.
    #[must_use]
    pub const fn op(&self) -> Option<FilterOp> {
        match self {
            Self::Eq(_) => None,
            Self::Gt(_) => Some(FilterOp::Gt),
            Self::Gte(_) => Some(FilterOp::Gte),
            Self::Lt(_) => Some(FilterOp::Lt),
            Self::Lte(_) => Some(FilterOp::Lte),
            Self::Neq(_) => Some(FilterOp::Neq),
            Self::Between(..) => Some(FilterOp::Between),
            Self::Inq(_) => Some(FilterOp::Inq),
            Self::Nin(_) => Some(FilterOp::Nin),
            Self::Max(_) => Some(FilterOp::Max),
        }
    }

    /// Parses a filter value from JSON.
    ///
    /// A single-key object is read as `{operator: operand}`; any other value
    /// is plain equality.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        let JsonValue::Object(map) = value else {
            return Ok(Self::Eq(SqlValue::from(value)));
        };
        if map.len() != 1 {
            return Ok(Self::Eq(SqlValue::Json(JsonValue::Object(map))));
        }
        let Some((key, operand)) = map.into_iter().next() else {
            return Ok(Self::Eq(SqlValue::Null));
        };
        let op: FilterOp = key.parse()?;
        Self::with_operand(op, operand)
    }

    /// Parses a filter value for a field stored as serialized JSON.
    ///
    /// An object is a document to compare against, unless it is a single
    /// known operator.
    pub fn from_json_document(value: JsonValue) -> Result<Self> {
        let JsonValue::Object(map) = value else {
            return Ok(Self::Eq(SqlValue::from(value)));
        };
        let op = (map.len() == 1)
            .then(|| map.keys().next().and_then(|k| k.parse::<FilterOp>().ok()))
            .flatten();
        match op {
            Some(op) => {
                let operand = map.into_iter().next().map_or(JsonValue::Null, |(_, v)| v);
                Self::with_operand(op, operand)
            }
            None => Ok(Self::Eq(SqlValue::Json(JsonValue::Object(map)))),
        }
    }

    fn with_operand(op: FilterOp, operand: JsonValue) -> Result<Self> {
        match op {
            FilterOp::Gt => Ok(Self::Gt(operand.into())),
            FilterOp::Gte => Ok(Self::Gte(operand.into())),
            FilterOp::Lt => Ok(Self::Lt(operand.into())),
            FilterOp::Lte => Ok(Self::Lte(operand.into())),
            FilterOp::Neq => Ok(Self::Neq(operand.into())),
            FilterOp::Inq => Ok(Self::Inq(operand.into())),
            FilterOp::Nin => Ok(Self::Nin(operand.into())),
            FilterOp::Between => match operand {
                JsonValue::Array(bounds) if bounds.len() == 2 => {
                    let mut bounds = bounds.into_iter().map(SqlValue::from);
                    match (bounds.next(), bounds.next()) {
                        (Some(low), Some(high)) => Ok(Self::Between(low, high)),
                        _ => Err(invalid(op, "expected [low, high]")),
                    }
                }
                _ => Err(invalid(op, "expected [low, high]")),
            },
            FilterOp::Max => {
                let JsonValue::Object(mut desc) = operand else {
                    return Err(invalid(op, "expected {field, from, where?}"));
                };
                let field = take_string(&mut desc, "field")
                    .ok_or_else(|| invalid(op, "missing 'field'"))?;
                let from = take_string(&mut desc, "from")
                    .or_else(|| take_string(&mut desc, "fromTable"))
                    .ok_or_else(|| invalid(op, "missing 'from'"))?;
                let filter = match desc.remove("where") {
                    None | Some(JsonValue::Null) => None,
                    Some(nested) => Some(Box::new(Where::from_json(nested)?)),
                };
                Ok(Self::Max(MaxSubquery {
                    field,
                    from,
                    filter,
                }))
            }
        }
    }
}

fn invalid(op: FilterOp, reason: &str) -> CompileError {
    CompileError::InvalidOperand {
        op: op.name().to_string(),
        reason: reason.to_string(),
    }
}

fn take_string(map: &mut serde_json::Map<String, JsonValue>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(JsonValue::String(s)) => Some(s),
        _ => None,
    }
}

/// An ordered conjunction of field filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    conditions: Vec<(String, FilterExpr)>,
}

impl Where {
    /// Creates an empty filter.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Parses a filter document such as
    /// `{"name": {"inq": ["a", "b"]}, "deleted": null}`.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        Self::parse(value, |_| false)
    }

    /// Parses a filter document for `model`. Values given for JSON and
    /// array fields are read with [`FilterExpr::from_json_document`], so
    /// `{"meta": {"color": "red"}}` compares the whole document.
    pub fn from_json_for(model: &ModelDef, value: JsonValue) -> Result<Self> {
        Self::parse(value, |field| {
            model
                .field_def(field)
                .is_some_and(|f| f.logical_type.is_serialized())
        })
    }

    fn parse(value: JsonValue, serialized: impl Fn(&str) -> bool) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(Self::new()),
            JsonValue::Object(map) => {
                let mut filter = Self::new();
                for (field, expr) in map {
                    let expr = if serialized(&field) {
                        FilterExpr::from_json_document(expr)?
                    } else {
                        FilterExpr::from_json(expr)?
                    };
                    filter = filter.and(field, expr);
                }
                Ok(filter)
            }
            other => Err(CompileError::InvalidOperand {
                op: "where".to_string(),
                reason: format!("expected an object, got {other}"),
            }),
        }
    }

    /// Appends a condition.
    #[must_use]
    pub fn and(mut self, field: impl Into<String>, expr: FilterExpr) -> Self {
        self.conditions.push((field.into(), expr));
        self
    }

    /// `field = value`.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.and(field, FilterExpr::Eq(value.to_sql_value()))
    }

    /// `field IS NULL`.
    #[must_use]
    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.and(field, FilterExpr::Eq(SqlValue::Null))
    }

    /// `field > value`.
    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.and(field, FilterExpr::Gt(value.to_sql_value()))
    }

    /// `field >= value`.
    #[must_use]
    pub fn gte(self, field: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.and(field, FilterExpr::Gte(value.to_sql_value()))
    }

    /// `field < value`.
    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.and(field, FilterExpr::Lt(value.to_sql_value()))
    }

    /// `field <= value`.
    #[must_use]
    pub fn lte(self, field: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.and(field, FilterExpr::Lte(value.to_sql_value()))
    }

    /// `field != value`.
    #[must_use]
    pub fn neq(self, field: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.and(field, FilterExpr::Neq(value.to_sql_value()))
    }

    /// `field BETWEEN low AND high`.
    #[must_use]
    pub fn between(
        self,
        field: impl Into<String>,
        low: impl ToSqlValue,
        high: impl ToSqlValue,
    ) -> Self {
        self.and(
            field,
            FilterExpr::Between(low.to_sql_value(), high.to_sql_value()),
        )
    }

    /// `field IN (values...)`.
    #[must_use]
    pub fn inq<T: ToSqlValue>(self, field: impl Into<String>, values: Vec<T>) -> Self {
        self.and(field, FilterExpr::Inq(values.to_sql_value()))
    }

    /// `field NOT IN (values...)`.
    #[must_use]
    pub fn nin<T: ToSqlValue>(self, field: impl Into<String>, values: Vec<T>) -> Self {
        self.and(field, FilterExpr::Nin(values.to_sql_value()))
    }

    /// `field = (SELECT MAX(...) FROM ...)`.
    #[must_use]
    pub fn max(self, field: impl Into<String>, subquery: MaxSubquery) -> Self {
        self.and(field, FilterExpr::Max(subquery))
    }

    /// Returns the conditions in insertion order.
    #[must_use]
    pub fn conditions(&self) -> &[(String, FilterExpr)] {
        &self.conditions
    }

    /// Returns `true` when there are no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
