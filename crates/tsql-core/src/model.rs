//! Model declarations.
//!
//! A [`ModelDef`] describes one persisted model: its logical fields, the
//! indexes declared over them, and the resolved primary key. Models are
//! registered once in a [`Registry`], which every compiler and differ call
//! receives explicitly.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::dialect::{Dialect, MssqlDialect};
use crate::error::{CompileError, Result};

/// Primary-key name used when nothing else applies.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Caller-facing field types, independent of any storage type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    /// Bounded text.
    String,
    /// Unbounded text.
    Text,
    /// Integer number.
    Number,
    /// Point in time.
    Date,
    /// True/false flag.
    Boolean,
    /// Geometric point, stored as a float.
    Point,
    /// Structured document, stored as serialized JSON.
    #[serde(rename = "JSON")]
    Json,
    /// A list of values of the inner type, stored as serialized JSON.
    Array(Box<LogicalType>),
}

impl LogicalType {
    /// Returns `true` for types whose values are stored as serialized JSON.
    #[must_use]
    pub const fn is_serialized(&self) -> bool {
        matches!(self, Self::Json | Self::Array(_))
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "String"),
            Self::Text => write!(f, "Text"),
            Self::Number => write!(f, "Number"),
            Self::Date => write!(f, "Date"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Point => write!(f, "Point"),
            Self::Json => write!(f, "JSON"),
            Self::Array(inner) => write!(f, "[{inner}]"),
        }
    }
}

/// Sort direction of an index column or ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending (ASC).
    #[default]
    #[serde(rename = "ASC")]
    Asc,
    /// Descending (DESC).
    #[serde(rename = "DESC")]
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

impl FromStr for Direction {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(CompileError::InvalidOrder(s.to_string()))
        }
    }
}

/// Physical organisation of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexKind {
    /// A clustered index; reserved for the primary key by table creation.
    #[serde(rename = "CLUSTERED")]
    Clustered,
    /// A regular secondary index.
    #[default]
    #[serde(rename = "NONCLUSTERED")]
    NonClustered,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clustered => write!(f, "CLUSTERED"),
            Self::NonClustered => write!(f, "NONCLUSTERED"),
        }
    }
}

/// One column of an index, written as `"name"` or `"name DESC"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexColumn {
    /// Field name.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

impl IndexColumn {
    /// Creates an ascending index column.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    /// Creates a descending index column.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

impl FromStr for IndexColumn {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| CompileError::InvalidOrder(s.to_string()))?;
        let direction = parts.next().map_or(Ok(Direction::Asc), str::parse)?;
        if parts.next().is_some() {
            return Err(CompileError::InvalidOrder(s.to_string()));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

impl TryFrom<String> for IndexColumn {
    type Error = CompileError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<IndexColumn> for String {
    fn from(col: IndexColumn) -> Self {
        match col.direction {
            Direction::Asc => col.field,
            Direction::Desc => format!("{} DESC", col.field),
        }
    }
}

/// Inline single-column index declared on a field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldIndex {
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Explicit index name.
    pub name: Option<String>,
    /// Physical kind.
    pub kind: IndexKind,
    /// Sort direction of the single column.
    #[serde(rename = "type")]
    pub direction: Direction,
}

/// An index over one or more fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Indexed columns in key order.
    pub columns: Vec<IndexColumn>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
    /// Explicit index name.
    #[serde(default)]
    pub name: Option<String>,
    /// Physical kind.
    #[serde(default)]
    pub kind: IndexKind,
}

impl IndexSpec {
    /// Creates a non-unique index over the given columns.
    #[must_use]
    pub fn new(columns: Vec<IndexColumn>) -> Self {
        Self {
            columns,
            unique: false,
            name: None,
            kind: IndexKind::NonClustered,
        }
    }

    /// Marks the index unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets an explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the index name, generating `<col>_<col>_<KIND>_<DIR>_idx`
    /// when none was declared.
    #[must_use]
    pub fn resolved_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let direction = self
            .columns
            .first()
            .map_or(Direction::Asc, |c| c.direction);
        let mut name = String::new();
        for col in &self.columns {
            name.push_str(&col.field);
            name.push('_');
        }
        format!("{name}{}_{direction}_idx", self.kind)
    }

    /// Returns the indexed field names in key order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.field.as_str()).collect()
    }
}

/// A single declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Logical field name, also used as the column name.
    pub name: String,
    /// Logical type.
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
    /// Whether NULL is allowed.
    #[serde(default = "default_nullable", alias = "allowNull", alias = "null")]
    pub nullable: bool,
    /// Maximum length for bounded text.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Inline single-column index.
    #[serde(default, deserialize_with = "deserialize_field_index")]
    pub index: Option<FieldIndex>,
    /// Whether this field is the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Explicit storage name of the primary-key column.
    #[serde(default)]
    pub column: Option<String>,
}

const fn default_nullable() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexDecl {
    Flag(bool),
    Spec(FieldIndex),
}

fn deserialize_field_index<'de, D>(deserializer: D) -> std::result::Result<Option<FieldIndex>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<IndexDecl>::deserialize(deserializer)? {
        None | Some(IndexDecl::Flag(false)) => None,
        Some(IndexDecl::Flag(true)) => Some(FieldIndex::default()),
        Some(IndexDecl::Spec(spec)) => Some(spec),
    })
}

impl FieldDef {
    /// Creates a nullable field of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: true,
            limit: None,
            index: None,
            primary_key: false,
            column: None,
        }
    }

    /// Creates a String field.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::String)
    }

    /// Creates a Text field.
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Text)
    }

    /// Creates a Number field.
    #[must_use]
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Number)
    }

    /// Creates a Date field.
    #[must_use]
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Date)
    }

    /// Creates a Boolean field.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Boolean)
    }

    /// Creates a JSON field.
    #[must_use]
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Json)
    }

    /// Sets the length limit.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Disallows NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Declares a default single-column index.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.index = Some(FieldIndex::default());
        self
    }

    /// Declares a single-column index with explicit settings.
    #[must_use]
    pub fn with_index(mut self, index: FieldIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Marks the field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the storage name of a primary-key column.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Returns the inline index as a full [`IndexSpec`].
    #[must_use]
    pub fn index_spec(&self) -> Option<IndexSpec> {
        self.index.as_ref().map(|idx| IndexSpec {
            columns: vec![IndexColumn {
                field: self.name.clone(),
                direction: idx.direction,
            }],
            unique: idx.unique,
            name: idx.name.clone(),
            kind: idx.kind,
        })
    }
}

/// A declared model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDef {
    /// Logical model name.
    pub name: String,
    /// Table name override; the model name is used when absent.
    #[serde(default)]
    pub table: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
    /// Multi-column indexes in declaration order.
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    #[serde(skip, default = "default_primary_key")]
    primary_key: String,
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

impl ModelDef {
    /// Creates a model with no fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: Vec::new(),
            indexes: Vec::new(),
            primary_key: default_primary_key(),
        }
    }

    /// Overrides the table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a multi-column index.
    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Returns the resolved primary-key column name.
    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Returns the escaped table name (`.` replaced by `_`).
    #[must_use]
    pub fn table_name(&self) -> String {
        MssqlDialect.escape_name(self.table.as_deref().unwrap_or(&self.name))
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if `name` is the primary key, either by its field
    /// name or by its storage name.
    #[must_use]
    pub fn is_primary_key(&self, name: &str) -> bool {
        name == self.primary_key
            || self
                .fields
                .iter()
                .any(|f| f.primary_key && f.name == name)
    }

    /// Returns the declared fields that map to regular columns.
    pub fn columns(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !self.is_primary_key(&f.name))
    }

    /// Returns the inline single-column indexes in declaration order.
    #[must_use]
    pub fn single_column_indexes(&self) -> Vec<IndexSpec> {
        self.columns().filter_map(FieldDef::index_spec).collect()
    }

    /// Returns every declared index: single-column first, then multi-column.
    #[must_use]
    pub fn declared_indexes(&self) -> Vec<IndexSpec> {
        let mut all = self.single_column_indexes();
        all.extend(self.indexes.iter().cloned());
        all
    }

    /// Resolves the primary key: an explicit `primary_key` field wins, then
    /// the `<ModelName>ID` convention, then `id`.
    fn resolve_primary_key(&mut self, table_name_id: bool) -> Result<()> {
        let explicit: Vec<&FieldDef> = self.fields.iter().filter(|f| f.primary_key).collect();
        if explicit.len() > 1 {
            return Err(CompileError::InvalidModel {
                model: self.name.clone(),
                reason: "more than one primary key field".to_string(),
            });
        }
        self.primary_key = if let Some(field) = explicit.first() {
            field.column.clone().unwrap_or_else(|| field.name.clone())
        } else if table_name_id {
            format!("{}ID", self.name)
        } else {
            default_primary_key()
        };
        Ok(())
    }

    fn validate_indexes(&self) -> Result<()> {
        // The primary key is indexed by its table constraint.
        if let Some(field) = self
            .fields
            .iter()
            .find(|f| f.index.is_some() && self.is_primary_key(&f.name))
        {
            return Err(CompileError::InvalidModel {
                model: self.name.clone(),
                reason: format!("primary key field '{}' cannot carry an index", field.name),
            });
        }
        for index in &self.indexes {
            if index.columns.is_empty() {
                return Err(CompileError::InvalidModel {
                    model: self.name.clone(),
                    reason: format!("index '{}' has no columns", index.resolved_name()),
                });
            }
            for col in &index.columns {
                if self.field_def(&col.field).is_none() {
                    return Err(CompileError::InvalidModel {
                        model: self.name.clone(),
                        reason: format!(
                            "index '{}' references unknown field '{}'",
                            index.resolved_name(),
                            col.field
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Adapter-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterSettings {
    /// Database schema that owns every table.
    pub schema: String,
    /// Name primary keys `<ModelName>ID` instead of `id`.
    #[serde(alias = "tableNameID")]
    pub table_name_id: bool,
    /// Target Azure SQL, which rejects the on-premise storage clauses.
    pub azure: bool,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            schema: "dbo".to_string(),
            table_name_id: false,
            azure: false,
        }
    }
}

/// The set of declared models, keyed by model name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    settings: AdapterSettings,
    models: BTreeMap<String, ModelDef>,
}

impl Registry {
    /// Creates an empty registry with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry with the given settings.
    #[must_use]
    pub fn with_settings(settings: AdapterSettings) -> Self {
        Self {
            settings,
            models: BTreeMap::new(),
        }
    }

    /// Creates a registry and defines every model in order.
    pub fn from_models(settings: AdapterSettings, models: Vec<ModelDef>) -> Result<Self> {
        let mut registry = Self::with_settings(settings);
        for model in models {
            registry.define(model)?;
        }
        Ok(registry)
    }

    /// Registers a model, resolving its primary key.
    ///
    /// Defining a model under an existing name replaces it.
    pub fn define(&mut self, mut model: ModelDef) -> Result<&ModelDef> {
        model.resolve_primary_key(self.settings.table_name_id)?;
        model.validate_indexes()?;
        let name = model.name.clone();
        self.models.insert(name.clone(), model);
        self.model(&name)
    }

    /// Looks up a model by name.
    pub fn model(&self, name: &str) -> Result<&ModelDef> {
        self.models
            .get(name)
            .ok_or_else(|| CompileError::UnknownModel(name.to_string()))
    }

    /// Iterates over every model, sorted by name.
    pub fn models(&self) -> impl Iterator<Item = &ModelDef> {
        self.models.values()
    }

    /// Returns the adapter settings.
    #[must_use]
    pub const fn settings(&self) -> &AdapterSettings {
        &self.settings
    }
}
