//! Scripted in-memory backend for executor tests.

use crate::backend::{
    JobHandle, JobOptions, JobStats, OneshotOptions, ResultRecord, Row, SearchBackend,
};
use crate::error::SearchError;
use serde_json::Value;
use std::collections::VecDeque;

#[derive(Default)]
pub struct ScriptedBackend {
    /// Poll answers, consumed front to back. Once empty, the job reports
    /// itself as still running.
    pub polls: VecDeque<Result<Option<JobStats>, SearchError>>,
    /// Rows served by `fetch`, paged by `count`/`offset`.
    pub rows: Vec<Row>,
    /// Messages prepended to every fetched page.
    pub page_messages: Vec<ResultRecord>,
    /// `fetch` fails once asked for this offset.
    pub fail_fetch_at: Option<u64>,
    pub fail_submit: bool,
    pub oneshot_records: Vec<ResultRecord>,
    pub indexes: Vec<String>,

    pub submitted: Vec<(String, JobOptions)>,
    pub fetches: Vec<(usize, u64)>,
    pub oneshots: Vec<(String, OneshotOptions)>,
    pub cancelled: Vec<String>,
    pub fail_cancel: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, answer: Result<Option<JobStats>, SearchError>) -> Self {
        self.polls.push_back(answer);
        self
    }

    pub fn running(self, progress: f64) -> Self {
        self.answer(Ok(Some(JobStats {
            done_progress: progress,
            ..JobStats::default()
        })))
    }

    /// Final poll answer: the search head gave up on the job.
    pub fn failed(self, message: &str) -> Self {
        self.answer(Ok(Some(JobStats {
            is_done: true,
            is_failed: true,
            done_progress: 100.0,
            messages: vec![message.to_string()],
            ..JobStats::default()
        })))
    }

    /// Final poll answer: done, reporting every scripted row.
    pub fn done(self) -> Self {
        let count = self.rows.len() as u64;
        self.answer(Ok(Some(JobStats {
            is_done: true,
            done_progress: 100.0,
            scan_count: count,
            event_count: count,
            result_count: count,
            ..JobStats::default()
        })))
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }
}

pub fn row(value: Value) -> Row {
    serde_json::from_value(value).expect("row fixture must be an object")
}

impl SearchBackend for ScriptedBackend {
    fn submit(&mut self, query: &str, opts: &JobOptions) -> Result<JobHandle, SearchError> {
        if self.fail_submit {
            return Err(SearchError::Http {
                status: 400,
                body: "Error in 'search' command".to_string(),
            });
        }
        self.submitted.push((query.to_string(), opts.clone()));
        Ok(JobHandle::new(format!("scripted.{}", self.submitted.len())))
    }

    fn poll(&mut self, _job: &JobHandle) -> Result<Option<JobStats>, SearchError> {
        self.polls
            .pop_front()
            .unwrap_or_else(|| Ok(Some(JobStats::default())))
    }

    fn fetch(
        &mut self,
        _job: &JobHandle,
        count: usize,
        offset: u64,
    ) -> Result<Vec<ResultRecord>, SearchError> {
        self.fetches.push((count, offset));
        if self.fail_fetch_at == Some(offset) {
            return Err(SearchError::Http {
                status: 503,
                body: "search head unavailable".to_string(),
            });
        }
        let start = (offset as usize).min(self.rows.len());
        let end = (start + count).min(self.rows.len());
        let mut records = self.page_messages.clone();
        records.extend(self.rows[start..end].iter().cloned().map(ResultRecord::Row));
        Ok(records)
    }

    fn oneshot(
        &mut self,
        query: &str,
        opts: &OneshotOptions,
    ) -> Result<Vec<ResultRecord>, SearchError> {
        self.oneshots.push((query.to_string(), *opts));
        Ok(self.oneshot_records.clone())
    }

    fn list_indexes(&mut self) -> Result<Vec<String>, SearchError> {
        Ok(self.indexes.clone())
    }

    fn cancel(&mut self, job: &JobHandle) -> Result<(), SearchError> {
        self.cancelled.push(job.sid.clone());
        if self.fail_cancel {
            return Err(SearchError::Http {
                status: 404,
                body: "Unknown sid".to_string(),
            });
        }
        Ok(())
    }
}
