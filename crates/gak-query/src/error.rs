//! Query construction errors.

use thiserror::Error;

/// Fatal errors raised while building a query.
///
/// Per-clause problems are not errors; they surface as
/// [`Diagnostic`](crate::Diagnostic)s on the built query instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The index is empty or contains characters the search language does not allow.
    #[error("invalid index '{0}'")]
    InvalidIndex(String),

    /// A projected or sorted field name is not a legal identifier.
    #[error("invalid field name '{field}' in {context}")]
    InvalidField { field: String, context: &'static str },

    /// Operator outside the permitted set.
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// A condition could not be decoded (wrong pair arity, nested objects, ...).
    #[error("malformed condition for field '{field}': {reason}")]
    MalformedCondition { field: String, reason: String },
}
