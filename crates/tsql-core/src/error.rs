//! Error types for statement compilation.

use thiserror::Error;

/// Errors raised while compiling values, filters, and statements.
///
/// Every variant is a caller bug: the input cannot be compiled as given and
/// retrying with the same input fails the same way.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A statement was requested for a model that was never defined.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// A filter used an operator outside the supported set.
    #[error("unsupported filter operator '{0}'")]
    UnsupportedOperator(String),

    /// A filter operator received an operand of the wrong shape.
    #[error("invalid operand for '{op}': {reason}")]
    InvalidOperand {
        /// The operator name.
        op: String,
        /// What was wrong with the operand.
        reason: String,
    },

    /// A Date field received a value that cannot be read as a timestamp.
    #[error("invalid date value for field '{field}': {value}")]
    InvalidDate {
        /// The field being compiled.
        field: String,
        /// The offending value.
        value: String,
    },

    /// Something other than a parameter collection was passed where one is
    /// expected.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// An ORDER BY token could not be parsed.
    #[error("invalid order specification '{0}'")]
    InvalidOrder(String),

    /// A model declaration is inconsistent.
    #[error("invalid model '{model}': {reason}")]
    InvalidModel {
        /// The model name.
        model: String,
        /// What was wrong with the declaration.
        reason: String,
    },

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;
