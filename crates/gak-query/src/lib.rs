//! # gak-query: The Grammar of gak
//!
//! Turns a structured filter spec into a single Splunk search
//! string. Construction is pure: no network, no clock, no randomness on the
//! client side. Identical inputs always render byte-identical queries, so the
//! output is usable as a cache key upstream.
//!
//! ```text
//! search index="events" status=active amount>=100 | table id amount | eval _random=random() | sort 0 _random
//! ```

pub mod builder;
pub mod error;
pub mod spec;
pub mod token;

pub use builder::{
    build_query, field_summary_query, unique_values_query, BuiltQuery, Diagnostic, QueryBuilder,
};
pub use error::QueryError;
pub use spec::{Comparison, Condition, FieldValue, QuerySpec};

use std::fmt;
use std::str::FromStr;

// =============================================================================
// Operators
// =============================================================================

/// The comparison operators the builder is willing to emit.
///
/// Anything outside this set is rejected when the clause is rendered; the
/// target grammar is otherwise treated as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Every permitted operator, in rendering-length order.
    pub const ALL: [CompareOp; 6] = [
        CompareOp::Gte,
        CompareOp::Lte,
        CompareOp::Neq,
        CompareOp::Gt,
        CompareOp::Lt,
        CompareOp::Eq,
    ];

    /// The operator as it appears in the search language.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareOp {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompareOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| QueryError::UnknownOperator(s.to_string()))
    }
}
