//! Ordered field payloads for inserts and updates.

use serde_json::Value as JsonValue;

use crate::error::{CompileError, Result};
use crate::value::{SqlValue, ToSqlValue};

/// An ordered set of `field = value` assignments.
///
/// Insertion order is preserved so that generated column lists and
/// parameter names are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, SqlValue)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets a field, replacing any earlier value in place.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.insert(field, value);
        self
    }

    /// Sets a field, replacing any earlier value in place.
    pub fn insert(&mut self, field: impl Into<String>, value: impl ToSqlValue) {
        let field = field.into();
        let value = value.to_sql_value();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == field) {
            slot.1 = value;
        } else {
            self.entries.push((field, value));
        }
    }

    /// Returns the value of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v)
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<SqlValue> {
        let pos = self.entries.iter().position(|(k, _)| k == field)?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterates over the assignments in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of assignments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when there are no assignments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a record from a JSON object.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        let JsonValue::Object(map) = value else {
            return Err(CompileError::InvalidOperand {
                op: "record".to_string(),
                reason: format!("expected an object, got {value}"),
            });
        };
        Ok(map.into_iter().map(|(k, v)| (k, SqlValue::from(v))).collect())
    }
}

impl FromIterator<(String, SqlValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_replaces_in_place() {
        let record = Record::new().set("a", 1).set("b", 2).set("a", 3);
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&SqlValue::Int(3)));
    }

    #[test]
    fn test_from_json_keeps_order() {
        let record = Record::from_json(json!({"z": 1, "a": "x"})).unwrap();
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(Record::from_json(json!([1, 2])).is_err());
    }
}
