//! # Result Tables
//!
//! Rows decoded from a search, plus the column bookkeeping the dashboards
//! need: display projections that hide Splunk's internal fields, explicit
//! field dropping, typed column casting and unique-value extraction.

use crate::backend::Row;
use crate::error::SearchError;
use chrono::{DateTime, Utc};
use gak_query::FieldValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Internal metadata fields Splunk attaches to every event. They clutter
/// user-facing tables.
pub const SYSTEM_FIELDS: [&str; 10] = [
    "_n",
    "_bkt",
    "_raw",
    "_si",
    "_sourcetype",
    "_serial",
    "_cd",
    "_time",
    "_indextime",
    "_subsecond",
];

pub fn is_system_field(field: &str) -> bool {
    SYSTEM_FIELDS.contains(&field)
}

// =============================================================================
// ResultTable
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl ResultTable {
    /// Columns are the union of row keys in first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Turn an empty table into [`SearchError::EmptyResult`].
    pub fn non_empty(self) -> Result<Self, SearchError> {
        if self.rows.is_empty() {
            Err(SearchError::EmptyResult)
        } else {
            Ok(self)
        }
    }

    /// Columns to show a user. The rows themselves keep every field.
    pub fn display_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|c| !is_system_field(c))
            .collect()
    }

    /// Values of one column; rows without the field are skipped.
    pub fn column(&self, name: &str) -> Vec<&Value> {
        self.rows.iter().filter_map(|r| r.get(name)).collect()
    }

    /// Remove exactly the listed fields from every row.
    pub fn drop_fields<S: AsRef<str>>(&mut self, fields: &[S]) {
        if fields.is_empty() {
            return;
        }
        let drop: HashSet<&str> = fields.iter().map(AsRef::as_ref).collect();
        for row in &mut self.rows {
            row.retain(|k, _| !drop.contains(k.as_str()));
        }
        self.columns.retain(|c| !drop.contains(c.as_str()));
    }

    /// Keep only the columns in `schema`, in schema order, casting each value.
    /// Missing and null values stay null.
    pub fn cast_columns(&self, schema: &IndexMap<String, ColumnType>) -> Result<ResultTable, SearchError> {
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut out = Row::with_capacity(schema.len());
            for (column, ty) in schema {
                let value = match row.get(column) {
                    Some(v) => ty.cast(column, v)?,
                    None => Value::Null,
                };
                out.insert(column.clone(), value);
            }
            rows.push(out);
        }
        Ok(ResultTable {
            columns: schema.keys().cloned().collect(),
            rows,
        })
    }

    /// Cell text for display.
    pub fn cell(row: &Row, column: &str) -> String {
        match row.get(column) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            Some(other) => other.to_string(),
        }
    }
}

// =============================================================================
// Column casting
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Str,
    Int,
    Float,
    Bool,
    /// RFC 3339 string or epoch seconds, normalized to RFC 3339 UTC.
    DateTime,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => write!(f, "str"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::DateTime => write!(f, "datetime"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "str" | "string" => Ok(Self::Str),
            "int" | "integer" => Ok(Self::Int),
            "float" | "number" => Ok(Self::Float),
            "bool" | "boolean" => Ok(Self::Bool),
            "datetime" | "time" => Ok(Self::DateTime),
            other => Err(format!("unknown column type '{}'", other)),
        }
    }
}

impl ColumnType {
    pub fn cast(self, column: &str, value: &Value) -> Result<Value, SearchError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let fail = || SearchError::Cast {
            column: column.to_string(),
            value: value.to_string(),
            target: self,
        };

        let cast = match self {
            ColumnType::Str => match value {
                Value::String(_) => Some(value.clone()),
                other => Some(Value::String(other.to_string())),
            },
            ColumnType::Int => as_int(value).map(Value::from),
            ColumnType::Float => as_float(value).map(Value::from),
            ColumnType::Bool => as_bool(value).map(Value::Bool),
            ColumnType::DateTime => as_datetime(value).map(|dt| Value::String(dt.to_rfc3339())),
        };
        cast.ok_or_else(fail)
    }
}

fn as_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_int(v: &Value) -> Option<i64> {
    if let Value::Number(n) = v {
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
    }
    if let Value::String(s) = v {
        if let Ok(i) = s.trim().parse::<i64>() {
            return Some(i);
        }
    }
    // "3.0" and 3.0 are integers; 3.5 is not
    as_float(v).filter(|f| f.fract() == 0.0 && f.is_finite()).map(|f| f as i64)
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Some(true),
            "false" | "f" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_datetime(v: &Value) -> Option<DateTime<Utc>> {
    if let Value::String(s) = v {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s.trim()) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let secs = as_float(v)?;
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

// =============================================================================
// Unique values
// =============================================================================

/// Deduplicate (first occurrence wins), then sort numerically when every value
/// is a number and in natural order otherwise. Nulls and multi-value cells are
/// skipped.
pub fn unique_sorted<'a, I>(values: I) -> Vec<FieldValue>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut seen = HashSet::new();
    let mut unique: Vec<FieldValue> = values
        .into_iter()
        .filter_map(|v| FieldValue::from_json(v).ok().flatten())
        .filter(|v| seen.insert(v.to_json().to_string()))
        .collect();

    let numbers: Option<Vec<f64>> = unique.iter().map(finite_number).collect();
    if let Some(numbers) = numbers {
        let mut keyed: Vec<(f64, FieldValue)> = numbers.into_iter().zip(unique).collect();
        keyed.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        unique = keyed.into_iter().map(|(_, v)| v).collect();
    } else {
        unique.sort_by(|a, b| natural_cmp(&a.to_string(), &b.to_string()));
    }
    unique
}

/// `nan` and `inf` parse as floats but do not make a column numeric.
fn finite_number(value: &FieldValue) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

/// Compare strings treating digit runs as numbers (`host2` < `host10`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }

        let a_digit = a.starts_with(|c: char| c.is_ascii_digit());
        let b_digit = b.starts_with(|c: char| c.is_ascii_digit());
        let (a_chunk, a_rest) = split_run(a, a_digit);
        let (b_chunk, b_rest) = split_run(b, b_digit);

        let ord = if a_digit && b_digit {
            let (a_num, b_num) = (a_chunk.trim_start_matches('0'), b_chunk.trim_start_matches('0'));
            a_num
                .len()
                .cmp(&b_num.len())
                .then_with(|| a_num.cmp(b_num))
                .then_with(|| a_chunk.len().cmp(&b_chunk.len()))
        } else {
            a_chunk.cmp(b_chunk)
        };

        if ord != Ordering::Equal {
            return ord;
        }
        a = a_rest;
        b = b_rest;
    }
}

fn split_run(s: &str, digits: bool) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit() != digits)
        .map_or(s.len(), |(i, _)| i);
    s.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_columns_in_first_seen_order() {
        let table = ResultTable::from_rows(vec![
            row(json!({"b": 1, "_time": "t"})),
            row(json!({"a": 2, "b": 3})),
        ]);
        assert_eq!(table.columns(), &["b", "_time", "a"]);
        assert_eq!(table.display_columns(), vec!["b", "a"]);
        // display projection never touches the rows
        assert!(table.rows()[0].contains_key("_time"));
    }

    #[test]
    fn test_drop_fields_is_exact() {
        let mut table = ResultTable::from_rows(vec![
            row(json!({"_raw": "x", "_time": "t", "_custom": 1, "host": "h"})),
        ]);
        table.drop_fields(&["_raw", "_time", "not_there"]);
        let keys: Vec<&String> = table.rows()[0].keys().collect();
        assert_eq!(keys, vec!["_custom", "host"]);
        assert_eq!(table.columns(), &["_custom", "host"]);
    }

    #[test]
    fn test_non_empty() {
        assert!(matches!(
            ResultTable::default().non_empty(),
            Err(SearchError::EmptyResult)
        ));
        assert!(ResultTable::from_rows(vec![row(json!({"a": 1}))])
            .non_empty()
            .is_ok());
    }

    #[test]
    fn test_cast_columns() {
        let table = ResultTable::from_rows(vec![
            row(json!({"src": 10, "amount": "12.5", "n": "3", "ok": "true", "_time": "1700000000.500", "extra": "x"})),
            row(json!({"src": "11", "amount": 7, "n": "4.0", "ok": 0, "_time": "2023-11-14T22:13:20+01:00"})),
        ]);
        let schema: IndexMap<String, ColumnType> = [
            ("src".to_string(), ColumnType::Str),
            ("amount".to_string(), ColumnType::Float),
            ("n".to_string(), ColumnType::Int),
            ("ok".to_string(), ColumnType::Bool),
            ("_time".to_string(), ColumnType::DateTime),
        ]
        .into_iter()
        .collect();

        let cast = table.cast_columns(&schema).unwrap();
        assert_eq!(cast.columns(), &["src", "amount", "n", "ok", "_time"]);
        assert_eq!(cast.rows()[0]["src"], json!("10"));
        assert_eq!(cast.rows()[0]["amount"], json!(12.5));
        assert_eq!(cast.rows()[1]["n"], json!(4));
        assert_eq!(cast.rows()[1]["ok"], json!(false));
        assert_eq!(cast.rows()[0]["_time"], json!("2023-11-14T22:13:20.500+00:00"));
        assert_eq!(cast.rows()[1]["_time"], json!("2023-11-14T21:13:20+00:00"));
        assert!(!cast.rows()[0].contains_key("extra"));
    }

    #[test]
    fn test_cast_rejects_bad_values() {
        let table = ResultTable::from_rows(vec![row(json!({"n": "3.5"}))]);
        let schema: IndexMap<String, ColumnType> =
            [("n".to_string(), ColumnType::Int)].into_iter().collect();
        let err = table.cast_columns(&schema).unwrap_err();
        assert!(matches!(err, SearchError::Cast { target: ColumnType::Int, .. }));
    }

    #[test]
    fn test_unique_numeric() {
        let values = [json!("10"), json!("2"), json!("2"), json!("1"), json!(null), json!("10")];
        let unique = unique_sorted(values.iter());
        assert_eq!(
            unique,
            vec![FieldValue::from("1"), FieldValue::from("2"), FieldValue::from("10")]
        );
    }

    #[test]
    fn test_unique_natural_order() {
        let values = [json!("host10"), json!("host2"), json!("db"), json!("host2")];
        let unique = unique_sorted(values.iter());
        assert_eq!(
            unique,
            vec![
                FieldValue::from("db"),
                FieldValue::from("host2"),
                FieldValue::from("host10")
            ]
        );
    }

    #[test]
    fn test_unique_non_finite_strings_sort_naturally() {
        let values = [json!("nan"), json!("3"), json!("1"), json!("inf"), json!("2")];
        let unique = unique_sorted(values.iter());
        assert_eq!(
            unique,
            vec![
                FieldValue::from("1"),
                FieldValue::from("2"),
                FieldValue::from("3"),
                FieldValue::from("inf"),
                FieldValue::from("nan"),
            ]
        );
    }

    #[test]
    fn test_unique_mixed_number_types() {
        let values = [json!(2.5), json!(-1), json!("10"), json!(2.5)];
        let unique = unique_sorted(values.iter());
        assert_eq!(
            unique,
            vec![FieldValue::Int(-1), FieldValue::Float(2.5), FieldValue::from("10")]
        );
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("a2", "a10"), Ordering::Less);
        assert_eq!(natural_cmp("a10", "a10"), Ordering::Equal);
        assert_eq!(natural_cmp("a010", "a10"), Ordering::Greater);
        assert_eq!(natural_cmp("b", "a10"), Ordering::Greater);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
    }

    #[test]
    fn test_column_type_parsing() {
        assert_eq!("INT".parse::<ColumnType>().unwrap(), ColumnType::Int);
        assert_eq!("datetime".parse::<ColumnType>().unwrap(), ColumnType::DateTime);
        assert!("blob".parse::<ColumnType>().is_err());
    }
}
