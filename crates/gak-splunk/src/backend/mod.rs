//! # Search Backend Contract
//!
//! The narrow wire surface the executor needs from a search service:
//! submit, poll, fetch, oneshot (plus index listing). [`http::SplunkClient`]
//! speaks the Splunk REST API; tests plug in a scripted backend.
//!
//! Every method takes `&mut self`: a backend handle carries at most one
//! request in flight. Share one across threads only behind a `Mutex`.

pub mod http;
pub mod wire;

use crate::error::SearchError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// One result record, field name to value, in backend order.
pub type Row = IndexMap<String, serde_json::Value>;

/// Server-side search job id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub sid: String,
}

impl JobHandle {
    pub fn new(sid: impl Into<String>) -> Self {
        Self { sid: sid.into() }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sid)
    }
}

/// Progress snapshot of a tracked job.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct JobStats {
    pub is_done: bool,
    /// The backend gave up on the job. Checked before `is_done`, which
    /// Splunk also sets for failed jobs.
    pub is_failed: bool,
    /// Percentage, 0 to 100.
    pub done_progress: f64,
    pub scan_count: u64,
    pub event_count: u64,
    pub result_count: u64,
    /// Error and fatal messages attached to the job status.
    pub messages: Vec<String>,
}

impl fmt::Display for JobStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03.1}%   {} scanned   {} matched   {} results",
            self.done_progress, self.scan_count, self.event_count, self.result_count
        )
    }
}

/// An item from a results stream: data, or an informational message
/// (partial-results warnings and the like).
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRecord {
    Row(Row),
    Message { kind: String, text: String },
}

/// `earliest_time` / `latest_time` bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeBound {
    /// Splunk relative time modifier, passed through (`-24h@h`, `now`).
    Relative(String),
    At(DateTime<Utc>),
}

impl TimeBound {
    /// RFC 3339 timestamps become absolute bounds, anything else is relative.
    pub fn parse(raw: &str) -> Self {
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(dt) => TimeBound::At(dt.with_timezone(&Utc)),
            Err(_) => TimeBound::Relative(raw.trim().to_string()),
        }
    }

    pub fn to_param(&self) -> String {
        match self {
            TimeBound::Relative(s) => s.clone(),
            TimeBound::At(dt) => dt.timestamp().to_string(),
        }
    }
}

/// Options for a tracked (`exec_mode=normal`) job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOptions {
    pub max_count: u64,
    pub earliest_time: Option<TimeBound>,
    pub latest_time: Option<TimeBound>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            max_count: 30_000_000,
            earliest_time: None,
            latest_time: None,
        }
    }
}

/// Options for a one-shot search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneshotOptions {
    /// Hard cap on returned rows.
    pub count: usize,
}

pub trait SearchBackend {
    /// Create a tracked job.
    fn submit(&mut self, query: &str, opts: &JobOptions) -> Result<JobHandle, SearchError>;

    /// `Ok(None)` while the backend has not made the job status available yet.
    fn poll(&mut self, job: &JobHandle) -> Result<Option<JobStats>, SearchError>;

    /// Read `count` results starting at `offset` from a finished job.
    fn fetch(
        &mut self,
        job: &JobHandle,
        count: usize,
        offset: u64,
    ) -> Result<Vec<ResultRecord>, SearchError>;

    /// Run a search synchronously and return its (capped) results.
    fn oneshot(
        &mut self,
        query: &str,
        opts: &OneshotOptions,
    ) -> Result<Vec<ResultRecord>, SearchError>;

    fn list_indexes(&mut self) -> Result<Vec<String>, SearchError>;

    /// Stop a job the caller no longer waits for.
    fn cancel(&mut self, job: &JobHandle) -> Result<(), SearchError>;
}

impl<B: SearchBackend + ?Sized> SearchBackend for Box<B> {
    fn submit(&mut self, query: &str, opts: &JobOptions) -> Result<JobHandle, SearchError> {
        (**self).submit(query, opts)
    }

    fn poll(&mut self, job: &JobHandle) -> Result<Option<JobStats>, SearchError> {
        (**self).poll(job)
    }

    fn fetch(
        &mut self,
        job: &JobHandle,
        count: usize,
        offset: u64,
    ) -> Result<Vec<ResultRecord>, SearchError> {
        (**self).fetch(job, count, offset)
    }

    fn oneshot(
        &mut self,
        query: &str,
        opts: &OneshotOptions,
    ) -> Result<Vec<ResultRecord>, SearchError> {
        (**self).oneshot(query, opts)
    }

    fn list_indexes(&mut self) -> Result<Vec<String>, SearchError> {
        (**self).list_indexes()
    }

    fn cancel(&mut self, job: &JobHandle) -> Result<(), SearchError> {
        (**self).cancel(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_bounds() {
        assert_eq!(
            TimeBound::parse("-24h@h"),
            TimeBound::Relative("-24h@h".into())
        );
        let at = TimeBound::parse("2023-11-14T22:13:20Z");
        assert_eq!(at.to_param(), "1700000000");
    }

    #[test]
    fn test_stats_progress_line() {
        let stats = JobStats {
            is_done: false,
            done_progress: 42.5,
            scan_count: 1000,
            event_count: 120,
            result_count: 12,
            ..JobStats::default()
        };
        assert_eq!(
            stats.to_string(),
            "42.5%   1000 scanned   120 matched   12 results"
        );
    }
}
