//! # Splunk JSON Wire Format
//!
//! Pure decoders for the `output_mode=json` responses of the management API.
//! Splunk is loose with types (`"isDone": "1"`, counts as strings), so every
//! scalar is read leniently.

use super::{JobHandle, JobStats, ResultRecord, Row};
use crate::error::SearchError;
use serde_json::Value;

/// Dispatch states in which the job status is not meaningful yet.
const NOT_READY_STATES: [&str; 2] = ["QUEUED", "PARSING"];

const FAILED_STATE: &str = "FAILED";

/// `POST /services/auth/login` → session key.
pub fn decode_session_key(body: &Value) -> Result<String, SearchError> {
    body.get("sessionKey")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SearchError::Decode("login response has no sessionKey".to_string()))
}

/// `POST /services/search/jobs` → sid.
pub fn decode_sid(body: &Value) -> Result<JobHandle, SearchError> {
    body.get("sid")
        .and_then(Value::as_str)
        .map(JobHandle::new)
        .ok_or_else(|| SearchError::Decode("job creation response has no sid".to_string()))
}

/// `GET /services/search/jobs/<sid>` → stats, or `None` while not ready.
pub fn decode_job_status(body: &Value) -> Result<Option<JobStats>, SearchError> {
    let content = body
        .pointer("/entry/0/content")
        .ok_or_else(|| SearchError::Decode("job status has no entry content".to_string()))?;

    let state = content.get("dispatchState").and_then(Value::as_str);
    if state.map_or(false, |s| NOT_READY_STATES.contains(&s)) {
        return Ok(None);
    }

    let is_failed = state == Some(FAILED_STATE) || content.get("isFailed").map_or(false, flag);

    Ok(Some(JobStats {
        is_done: content.get("isDone").map_or(false, flag),
        is_failed,
        done_progress: content.get("doneProgress").map_or(0.0, number) * 100.0,
        scan_count: content.get("scanCount").map_or(0, count),
        event_count: content.get("eventCount").map_or(0, count),
        result_count: content.get("resultCount").map_or(0, count),
        messages: content.get("messages").map_or_else(Vec::new, status_messages),
    }))
}

/// Job status messages come either as `[{"type", "text"}]` or as a map of
/// type to texts. Only errors and fatal messages are kept.
fn status_messages(v: &Value) -> Vec<String> {
    let relevant = |kind: &str| matches!(kind.to_ascii_uppercase().as_str(), "ERROR" | "FATAL");
    match v {
        Value::Array(items) => items
            .iter()
            .filter(|m| m.get("type").and_then(Value::as_str).map_or(true, relevant))
            .filter_map(|m| match m {
                Value::String(text) => Some(text.clone()),
                other => other.get("text").and_then(Value::as_str).map(str::to_string),
            })
            .collect(),
        Value::Object(by_kind) => by_kind
            .iter()
            .filter(|(kind, _)| relevant(kind.as_str()))
            .flat_map(|(_, texts)| match texts {
                Value::Array(texts) => texts
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
                Value::String(text) => vec![text.clone()],
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Results document → messages first, then rows, in backend order.
pub fn decode_results(body: &Value) -> Result<Vec<ResultRecord>, SearchError> {
    let mut records = Vec::new();

    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        for m in messages {
            records.push(ResultRecord::Message {
                kind: m.get("type").and_then(Value::as_str).unwrap_or("INFO").to_string(),
                text: m.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
            });
        }
    }

    match body.get("results") {
        Some(Value::Array(results)) => {
            for r in results {
                let obj = r.as_object().ok_or_else(|| {
                    SearchError::Decode(format!("result record is not an object: {}", r))
                })?;
                let row: Row = obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                records.push(ResultRecord::Row(row));
            }
        }
        Some(other) => {
            return Err(SearchError::Decode(format!(
                "expected a results array, found {}",
                other
            )))
        }
        // Message-only documents are legal
        None => {}
    }

    Ok(records)
}

/// `GET /services/data/indexes` → index names.
pub fn decode_index_names(body: &Value) -> Result<Vec<String>, SearchError> {
    let entries = body
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Decode("index listing has no entry array".to_string()))?;

    Ok(entries
        .iter()
        .filter_map(|e| e.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

fn flag(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "True"),
        _ => false,
    }
}

fn number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn count(v: &Value) -> u64 {
    match v {
        Value::Number(n) => n.as_u64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as u64),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_status_running() {
        let body = json!({"entry": [{"name": "search x", "content": {
            "dispatchState": "RUNNING",
            "isDone": false,
            "doneProgress": 0.25,
            "scanCount": 4000,
            "eventCount": 300,
            "resultCount": 0
        }}]});
        let stats = decode_job_status(&body).unwrap().unwrap();
        assert!(!stats.is_done);
        assert_eq!(stats.done_progress, 25.0);
        assert_eq!(stats.scan_count, 4000);
        assert_eq!(stats.event_count, 300);
    }

    #[test]
    fn test_job_status_string_flags() {
        let body = json!({"entry": [{"content": {
            "dispatchState": "DONE",
            "isDone": "1",
            "doneProgress": "1.0",
            "scanCount": "10",
            "eventCount": "10",
            "resultCount": "7"
        }}]});
        let stats = decode_job_status(&body).unwrap().unwrap();
        assert!(stats.is_done);
        assert_eq!(stats.done_progress, 100.0);
        assert_eq!(stats.result_count, 7);
    }

    #[test]
    fn test_job_status_not_ready() {
        let body = json!({"entry": [{"content": {"dispatchState": "QUEUED"}}]});
        assert_eq!(decode_job_status(&body).unwrap(), None);
        assert!(decode_job_status(&json!({})).is_err());
    }

    #[test]
    fn test_job_status_failed() {
        let body = json!({"entry": [{"content": {
            "dispatchState": "FAILED",
            "isDone": "1",
            "isFailed": "1",
            "doneProgress": "1.0",
            "resultCount": "0",
            "messages": [
                {"type": "INFO", "text": "Your timerange was substituted"},
                {"type": "FATAL", "text": "Error in 'search' command: Unable to parse the search"}
            ]
        }}]});
        let stats = decode_job_status(&body).unwrap().unwrap();
        assert!(stats.is_failed);
        assert_eq!(
            stats.messages,
            vec!["Error in 'search' command: Unable to parse the search"]
        );

        // either signal alone marks the job failed
        let body = json!({"entry": [{"content": {"dispatchState": "DONE", "isFailed": true}}]});
        assert!(decode_job_status(&body).unwrap().unwrap().is_failed);
        let body = json!({"entry": [{"content": {
            "dispatchState": "FAILED",
            "messages": {"fatal": ["search head quota exceeded"], "info": ["ignored"]}
        }}]});
        let stats = decode_job_status(&body).unwrap().unwrap();
        assert!(stats.is_failed);
        assert_eq!(stats.messages, vec!["search head quota exceeded"]);
    }

    #[test]
    fn test_job_status_done_is_not_failed() {
        let body = json!({"entry": [{"content": {"dispatchState": "DONE", "isDone": "1", "isFailed": "0"}}]});
        let stats = decode_job_status(&body).unwrap().unwrap();
        assert!(stats.is_done);
        assert!(!stats.is_failed);
        assert!(stats.messages.is_empty());
    }

    #[test]
    fn test_results_with_messages() {
        let body = json!({
            "preview": false,
            "messages": [{"type": "WARN", "text": "Search results might be incomplete"}],
            "results": [
                {"host": "web01", "count": "3", "_raw": "..."},
                {"host": "web02", "count": "5"}
            ]
        });
        let records = decode_results(&body).unwrap();
        assert_eq!(records.len(), 3);
        assert!(matches!(&records[0], ResultRecord::Message { kind, .. } if kind == "WARN"));
        match &records[1] {
            ResultRecord::Row(row) => {
                let keys: Vec<&str> = row.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["host", "count", "_raw"]);
            }
            other => panic!("expected a row, got {other:?}"),
        }
    }

    #[test]
    fn test_results_rejects_non_objects() {
        assert!(decode_results(&json!({"results": [1, 2]})).is_err());
        assert!(decode_results(&json!({"results": "nope"})).is_err());
        assert!(decode_results(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_sid_session_and_indexes() {
        assert_eq!(
            decode_sid(&json!({"sid": "1700000000.42"})).unwrap(),
            JobHandle::new("1700000000.42")
        );
        assert_eq!(
            decode_session_key(&json!({"sessionKey": "abc"})).unwrap(),
            "abc"
        );
        assert!(decode_sid(&json!({})).is_err());

        let body = json!({"entry": [{"name": "main"}, {"name": "_internal"}, {"id": "x"}]});
        assert_eq!(decode_index_names(&body).unwrap(), vec!["main", "_internal"]);
    }
}
