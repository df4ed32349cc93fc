//! Named statement parameters.
//!
//! A [`Parameters`] collection is filled while a statement is being compiled
//! and handed to the executor alongside the SQL text. Parameters are only
//! ever appended; each one is referenced from the SQL as `@<name>`.

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};
use crate::value::SqlValue;

/// A single named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name, without the leading `@`.
    pub name: String,
    /// Bound value.
    pub value: SqlValue,
}

impl Param {
    /// Creates a new parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, value: SqlValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// An append-only, ordered collection of named parameters.
///
/// Generated names are `param1`, `param2`, ... The counter starts after the
/// seeded parameters when the collection is created with [`Parameters::seeded`].
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    params: Vec<Param>,
    next_id: usize,
}

impl Parameters {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            params: Vec::new(),
            next_id: 1,
        }
    }

    /// Creates a collection pre-seeded with existing parameters.
    #[must_use]
    pub fn seeded(params: Vec<Param>) -> Self {
        let next_id = params.len() + 1;
        Self { params, next_id }
    }

    /// Parses a collection from a JSON array of `{"name", "value"}` objects.
    ///
    /// Anything other than such an array is rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if !value.is_array() {
            return Err(CompileError::InvalidParameters(format!(
                "expected an array of parameters, got {value}"
            )));
        }
        let params: Vec<Param> = serde_json::from_value(value)
            .map_err(|e| CompileError::InvalidParameters(e.to_string()))?;
        Ok(Self::seeded(params))
    }

    /// Binds a value under a generated name and returns that name.
    pub fn add(&mut self, value: SqlValue) -> String {
        let name = format!("param{}", self.next_id);
        self.next_id += 1;
        self.params.push(Param::new(name.clone(), value));
        name
    }

    /// Binds a value under an explicit name and returns that name.
    ///
    /// The generated-name counter still advances so that a later generated
    /// name never lands on a number already consumed.
    pub fn add_named(&mut self, name: impl Into<String>, value: SqlValue) -> String {
        let name = name.into();
        self.next_id += 1;
        self.params.push(Param::new(name.clone(), value));
        name
    }

    /// Returns the parameters in binding order.
    #[must_use]
    pub fn as_slice(&self) -> &[Param] {
        &self.params
    }

    /// Looks up a bound value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Returns the number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if nothing has been bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Consumes the collection, returning the parameters in binding order.
    #[must_use]
    pub fn into_vec(self) -> Vec<Param> {
        self.params
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
