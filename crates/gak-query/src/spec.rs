//! # Query Spec
//!
//! The structured, pre-serialization form of a search filter: an ordered
//! mapping from field name to [`Condition`].
//!
//! JSON shape (as produced by dashboard widgets and the CLI):
//! ```text
//! {
//!   "status": "active",                        equality
//!   "amount": [">=", 100],                     single comparison
//!   "score":  [[">", 0.2], ["<=", 0.9]]        conjunctive comparisons
//! }
//! ```

use crate::error::QueryError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// =============================================================================
// Values
// =============================================================================

/// A scalar on the right-hand side of a clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    /// `""` and `"None"` are treated as "no value" by every widget upstream.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, FieldValue::Str(s) if s.is_empty() || s == "None")
    }

    /// Numeric view of the value, parsing strings when they hold a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(n) => Some(*n as f64),
            FieldValue::Float(n) => Some(*n),
            FieldValue::Str(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    /// Decode a JSON scalar. `null` is `Ok(None)`; arrays and objects are rejected.
    pub fn from_json(value: &Value) -> Result<Option<FieldValue>, String> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(FieldValue::Bool(*b))),
            Value::Number(n) => Ok(Some(match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            })),
            Value::String(s) => Ok(Some(FieldValue::Str(s.clone()))),
            Value::Array(_) => Err("expected a scalar, found an array".to_string()),
            Value::Object(_) => Err("expected a scalar, found an object".to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(n) => Value::from(*n),
            FieldValue::Float(n) => Value::from(*n),
            FieldValue::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(n) => write!(f, "{}", n),
            FieldValue::Float(n) => write!(f, "{}", n),
            FieldValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Int(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Int(n.into())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Float(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// An `(operator, value)` pair as supplied by the caller.
///
/// The operator is kept raw; it is checked against [`CompareOp`](crate::CompareOp)
/// only when the clause is rendered, so a bad pair degrades to a diagnostic
/// instead of failing the whole spec.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: String,
    pub value: Option<FieldValue>,
}

impl Comparison {
    pub fn new(op: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            op: op.into(),
            value: Some(value.into()),
        }
    }

    fn from_json(field: &str, pair: &[Value]) -> Result<Self, QueryError> {
        if pair.len() != 2 {
            return Err(QueryError::MalformedCondition {
                field: field.to_string(),
                reason: format!("expected an (operator, value) pair, found {} elements", pair.len()),
            });
        }

        let op = match &pair[0] {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            // Kept verbatim so the diagnostic can name it; it will never parse.
            other => other.to_string(),
        };
        let value = FieldValue::from_json(&pair[1]).map_err(|reason| QueryError::MalformedCondition {
            field: field.to_string(),
            reason,
        })?;

        Ok(Self { op, value })
    }

    fn to_json(&self) -> Value {
        Value::Array(vec![
            Value::String(self.op.clone()),
            self.value.as_ref().map_or(Value::Null, FieldValue::to_json),
        ])
    }
}

/// The condition attached to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `field=value`; `None` means the widget was left empty.
    Equals(Option<FieldValue>),
    /// `field<op>value`.
    Compare(Comparison),
    /// Every comparison must hold (implicit AND).
    All(Vec<Comparison>),
}

impl Condition {
    pub fn equals(value: impl Into<FieldValue>) -> Self {
        Condition::Equals(Some(value.into()))
    }

    pub fn compare(op: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Condition::Compare(Comparison::new(op, value))
    }

    pub fn all<I, O, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (O, V)>,
        O: Into<String>,
        V: Into<FieldValue>,
    {
        Condition::All(
            pairs
                .into_iter()
                .map(|(op, value)| Comparison::new(op, value))
                .collect(),
        )
    }

    /// Decode the JSON form of a condition for `field`.
    pub fn from_json(field: &str, value: &Value) -> Result<Self, QueryError> {
        match value {
            Value::Array(items) if items.is_empty() => Ok(Condition::Equals(None)),
            Value::Array(items) if items[0].is_array() => {
                let mut pairs = Vec::with_capacity(items.len());
                for item in items {
                    let pair = item.as_array().ok_or_else(|| QueryError::MalformedCondition {
                        field: field.to_string(),
                        reason: "mixed pairs and scalars in a condition list".to_string(),
                    })?;
                    pairs.push(Comparison::from_json(field, pair)?);
                }
                Ok(Condition::All(pairs))
            }
            Value::Array(items) => Ok(Condition::Compare(Comparison::from_json(field, items)?)),
            scalar => FieldValue::from_json(scalar)
                .map(Condition::Equals)
                .map_err(|reason| QueryError::MalformedCondition {
                    field: field.to_string(),
                    reason,
                }),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Condition::Equals(value) => value.as_ref().map_or(Value::Null, FieldValue::to_json),
            Condition::Compare(c) => c.to_json(),
            Condition::All(pairs) => Value::Array(pairs.iter().map(Comparison::to_json).collect()),
        }
    }
}

impl From<FieldValue> for Condition {
    fn from(value: FieldValue) -> Self {
        Condition::Equals(Some(value))
    }
}

impl From<&str> for Condition {
    fn from(s: &str) -> Self {
        Condition::equals(s)
    }
}

impl From<String> for Condition {
    fn from(s: String) -> Self {
        Condition::equals(s)
    }
}

impl From<i64> for Condition {
    fn from(n: i64) -> Self {
        Condition::equals(n)
    }
}

impl From<i32> for Condition {
    fn from(n: i32) -> Self {
        Condition::equals(n)
    }
}

impl From<f64> for Condition {
    fn from(n: f64) -> Self {
        Condition::equals(n)
    }
}

impl<V: Into<FieldValue>> From<(&str, V)> for Condition {
    fn from((op, value): (&str, V)) -> Self {
        Condition::compare(op, value)
    }
}

impl<V: Into<FieldValue>> From<Vec<(&str, V)>> for Condition {
    fn from(pairs: Vec<(&str, V)>) -> Self {
        Condition::all(pairs)
    }
}

// =============================================================================
// QuerySpec
// =============================================================================

/// Field name to condition, in the caller's insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, Value>", into = "IndexMap<String, Value>")]
pub struct QuerySpec {
    conditions: IndexMap<String, Condition>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the condition for `field`, keeping its original position.
    pub fn with(mut self, field: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.insert(field, condition);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, condition: impl Into<Condition>) {
        self.conditions.insert(field.into(), condition.into());
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.conditions.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl TryFrom<IndexMap<String, Value>> for QuerySpec {
    type Error = QueryError;

    fn try_from(raw: IndexMap<String, Value>) -> Result<Self, Self::Error> {
        let conditions = raw
            .iter()
            .map(|(field, value)| Ok((field.clone(), Condition::from_json(field, value)?)))
            .collect::<Result<IndexMap<_, _>, QueryError>>()?;
        Ok(Self { conditions })
    }
}

impl From<QuerySpec> for IndexMap<String, Value> {
    fn from(spec: QuerySpec) -> Self {
        spec.conditions
            .iter()
            .map(|(field, cond)| (field.clone(), cond.to_json()))
            .collect()
    }
}
