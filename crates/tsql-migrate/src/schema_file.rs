//! JSON model files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tsql_core::{AdapterSettings, ModelDef, Registry};

use crate::error::{MigrateError, Result};

/// Adapter settings plus model declarations, as stored on disk.
///
/// ```json
/// {
///   "settings": { "schema": "dbo", "azure": false },
///   "models": [
///     { "name": "User", "fields": [{ "name": "email", "type": "String", "limit": 100, "index": true }] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFile {
    /// Adapter-wide settings.
    #[serde(default)]
    pub settings: AdapterSettings,
    /// Models in declaration order.
    #[serde(default)]
    pub models: Vec<ModelDef>,
}

impl SchemaFile {
    /// Parses a schema file from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a schema file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| MigrateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Registers every model, resolving primary keys.
    pub fn into_registry(self) -> Result<Registry> {
        Ok(Registry::from_models(self.settings, self.models)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsql_core::LogicalType;

    #[test]
    fn test_parse_and_register() {
        let file = SchemaFile::from_json(
            r#"{
                "settings": { "tableNameID": true },
                "models": [{
                    "name": "User",
                    "fields": [
                        { "name": "name", "type": "String", "limit": 100 },
                        { "name": "active", "type": "Boolean", "allowNull": false }
                    ]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(file.settings.schema, "dbo");
        let registry = file.into_registry().unwrap();
        let user = registry.model("User").unwrap();
        assert_eq!(user.primary_key(), "UserID");
        let active = user.field_def("active").unwrap();
        assert_eq!(active.logical_type, LogicalType::Boolean);
        assert!(!active.nullable);
    }

    #[test]
    fn test_missing_file() {
        let err = SchemaFile::load(Path::new("/nonexistent/models.json")).unwrap_err();
        assert!(matches!(err, MigrateError::Io { .. }));
    }

    #[test]
    fn test_invalid_index_rejected() {
        let file = SchemaFile::from_json(
            r#"{ "models": [{ "name": "T", "fields": [], "indexes": [{ "columns": ["ghost"] }] }] }"#,
        )
        .unwrap();
        assert!(matches!(
            file.into_registry(),
            Err(MigrateError::Compile(_))
        ));
    }
}
