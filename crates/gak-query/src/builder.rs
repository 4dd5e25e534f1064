//! # Query Builder
//!
//! Composes `(index, QuerySpec, projection, sort)` into one search string:
//!
//! ```text
//! search index="<index>" <clauses...> [| table <fields...>] | sort <fields...>
//! search index="<index>" <clauses...> [| table <fields...>] | eval _random=random() | sort 0 _random
//! ```
//!
//! Bad clauses never abort the build. They are dropped and reported as
//! [`Diagnostic`]s; only an invalid index or an invalid projection/sort field
//! is fatal.

use crate::error::QueryError;
use crate::spec::{Comparison, Condition, QuerySpec};
use crate::token;
use crate::CompareOp;
use thiserror::Error;

/// Appended when no sort order is requested: a per-record random key so
/// sampled prefixes of the result are unbiased.
pub const RANDOM_SORT: &str = "| eval _random=random() | sort 0 _random";

/// Non-fatal findings recorded while building.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    /// A comparison was dropped (bad operator or missing value).
    #[error("dropped condition on '{field}': {reason}")]
    BadCondition { field: String, reason: String },

    /// A spec field name is not a legal identifier; its clause was dropped.
    #[error("dropped field '{field}': not a valid field name")]
    InvalidField { field: String },

    /// No projection was given, so the backend decides which columns come back.
    #[error("no field projection: retrieved columns are unconstrained")]
    UnconstrainedColumns,
}

/// A rendered query plus whatever was dropped on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub query: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuiltQuery {
    pub fn as_str(&self) -> &str {
        &self.query
    }

    /// Diagnostics that indicate a user-supplied clause was skipped.
    pub fn dropped(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| !matches!(d, Diagnostic::UnconstrainedColumns))
    }
}

/// Builder-style entry point.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    index: String,
    spec: QuerySpec,
    fields: Vec<String>,
    sort: Vec<String>,
}

impl QueryBuilder {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            ..Default::default()
        }
    }

    pub fn spec(mut self, spec: QuerySpec) -> Self {
        self.spec = spec;
        self
    }

    /// Restrict retrieved columns (`| table ...`), in this order.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Explicit sort order. Leave empty for the random default.
    pub fn sort<I, S>(mut self, sort: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = sort.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(&self) -> Result<BuiltQuery, QueryError> {
        build_query(&self.index, &self.spec, &self.fields, &self.sort)
    }
}

/// Render a query. Pure and deterministic.
pub fn build_query(
    index: &str,
    spec: &QuerySpec,
    fields: &[String],
    sort: &[String],
) -> Result<BuiltQuery, QueryError> {
    let mut parts = vec![index_clause(index)?];
    let mut diagnostics = Vec::new();

    for (field, condition) in spec.iter() {
        if !token::is_valid_field(field) {
            diagnostics.push(Diagnostic::InvalidField {
                field: field.to_string(),
            });
            continue;
        }

        match condition {
            Condition::Equals(Some(value)) if !value.is_sentinel() => {
                parts.push(format!("{}={}", field, token::render_value(value)));
            }
            // Widget left empty
            Condition::Equals(_) => {}
            Condition::Compare(pair) => match render_comparison(field, pair) {
                Ok(clause) => parts.push(clause),
                Err(d) => diagnostics.push(d),
            },
            Condition::All(pairs) => {
                for pair in pairs {
                    match render_comparison(field, pair) {
                        Ok(clause) => parts.push(clause),
                        Err(d) => diagnostics.push(d),
                    }
                }
            }
        }
    }

    if fields.is_empty() {
        diagnostics.push(Diagnostic::UnconstrainedColumns);
    } else {
        check_fields(fields, "projection")?;
        parts.push(format!("| table {}", fields.join(" ")));
    }

    if sort.is_empty() {
        parts.push(RANDOM_SORT.to_string());
    } else {
        check_fields(sort, "sort")?;
        parts.push(format!("| sort {}", sort.join(" ")));
    }

    for d in &diagnostics {
        match d {
            Diagnostic::UnconstrainedColumns => tracing::debug!("{}", d),
            _ => tracing::warn!("{}", d),
        }
    }

    let query = parts.join(" ");
    tracing::debug!(%query, "built search query");

    Ok(BuiltQuery { query, diagnostics })
}

/// `search index="<index>" | fields <f> | dedup <f> | sort +num(<f>)`
pub fn unique_values_query(index: &str, field: &str) -> Result<String, QueryError> {
    if !token::is_valid_field(field) {
        return Err(QueryError::InvalidField {
            field: field.to_string(),
            context: "unique values",
        });
    }
    Ok(format!(
        "{} | fields {f} | dedup {f} | sort +num({f})",
        index_clause(index)?,
        f = field
    ))
}

/// `search index="<index>" | fieldsummary | table field`
pub fn field_summary_query(index: &str) -> Result<String, QueryError> {
    Ok(format!("{} | fieldsummary | table field", index_clause(index)?))
}

fn index_clause(index: &str) -> Result<String, QueryError> {
    if !token::is_valid_index(index) {
        return Err(QueryError::InvalidIndex(index.to_string()));
    }
    Ok(format!("search index=\"{}\"", index))
}

fn check_fields(fields: &[String], context: &'static str) -> Result<(), QueryError> {
    match fields.iter().find(|f| !token::is_valid_field(f)) {
        Some(bad) => Err(QueryError::InvalidField {
            field: bad.clone(),
            context,
        }),
        None => Ok(()),
    }
}

fn render_comparison(field: &str, pair: &Comparison) -> Result<String, Diagnostic> {
    let bad = |reason: String| Diagnostic::BadCondition {
        field: field.to_string(),
        reason,
    };

    let op: CompareOp = pair
        .op
        .parse()
        .map_err(|_| bad(format!("invalid operator '{}'", pair.op)))?;

    match &pair.value {
        Some(value) if !value.is_sentinel() => {
            Ok(format!("{}{}{}", field, op, token::render_value(value)))
        }
        Some(value) => Err(bad(format!("invalid value '{}'", value))),
        None => Err(bad("missing value".to_string())),
    }
}
