//! Logical type to SQL Server column type mapping.

use tsql_core::{FieldDef, LogicalType};

/// Length used for bounded text when a field declares no limit.
pub const DEFAULT_VARCHAR_LENGTH: u32 = 255;

/// Maps field declarations to SQL Server column types.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatatypeMapper;

impl DatatypeMapper {
    /// Creates a mapper.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the bracketed column type, e.g. `[varchar](100)`.
    ///
    /// String, JSON and array fields are stored as bounded text.
    #[must_use]
    pub fn column_type(&self, field: &FieldDef) -> String {
        match field.logical_type {
            LogicalType::Text => "[text]".to_string(),
            LogicalType::Number => "[int]".to_string(),
            LogicalType::Date => "[datetime]".to_string(),
            LogicalType::Boolean => "[bit]".to_string(),
            LogicalType::Point => "[float]".to_string(),
            LogicalType::String | LogicalType::Json | LogicalType::Array(_) => format!(
                "[varchar]({})",
                field.limit.unwrap_or(DEFAULT_VARCHAR_LENGTH)
            ),
        }
    }

    /// Returns the column type followed by `NULL` or `NOT NULL`.
    #[must_use]
    pub fn column_settings(&self, field: &FieldDef) -> String {
        let null = if field.nullable { "NULL" } else { "NOT NULL" };
        format!("{} {null}", self.column_type(field))
    }

    /// Normalizes a type string for comparison: brackets and whitespace are
    /// removed and letters upper-cased, so `[varchar](100)` and
    /// `varchar(100)` compare equal.
    #[must_use]
    pub fn normalize(raw: &str) -> String {
        raw.chars()
            .filter(|c| !matches!(c, '[' | ']') && !c.is_whitespace())
            .collect::<String>()
            .to_uppercase()
    }

    /// Returns `true` if the declared field and the introspected type string
    /// describe the same column type.
    #[must_use]
    pub fn same_type(&self, field: &FieldDef, actual: &str) -> bool {
        Self::normalize(&self.column_type(field)) == Self::normalize(actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_is_total() {
        let mapper = DatatypeMapper::new();
        let cases = [
            (FieldDef::string("a"), "[varchar](255)"),
            (FieldDef::string("a").limit(100), "[varchar](100)"),
            (FieldDef::json("a"), "[varchar](255)"),
            (
                FieldDef::new("a", LogicalType::Array(Box::new(LogicalType::Number))),
                "[varchar](255)",
            ),
            (FieldDef::text("a"), "[text]"),
            (FieldDef::number("a"), "[int]"),
            (FieldDef::date("a"), "[datetime]"),
            (FieldDef::boolean("a"), "[bit]"),
            (FieldDef::new("a", LogicalType::Point), "[float]"),
        ];
        for (field, expected) in cases {
            assert_eq!(mapper.column_type(&field), expected);
        }
    }

    #[test]
    fn test_column_settings() {
        let mapper = DatatypeMapper::new();
        assert_eq!(
            mapper.column_settings(&FieldDef::string("a").limit(10)),
            "[varchar](10) NULL"
        );
        assert_eq!(
            mapper.column_settings(&FieldDef::number("a").not_null()),
            "[int] NOT NULL"
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(DatatypeMapper::normalize("[varchar](100)"), "VARCHAR(100)");
        assert_eq!(DatatypeMapper::normalize("varchar (100)"), "VARCHAR(100)");
        assert!(DatatypeMapper::new().same_type(&FieldDef::number("n"), "int"));
        assert!(!DatatypeMapper::new().same_type(&FieldDef::string("s"), "varchar(100)"));
    }
}
