//! # Query Executor
//!
//! Runs search strings against a [`SearchBackend`] in two modes:
//!
//! - **Tracked jobs** ([`run_job`](QueryExecutor::run_job)): submit, poll
//!   with backoff until done, then page through the results. Bounded by a
//!   timeout and abortable through a [`CancelToken`].
//! - **One-shot** ([`oneshot`](QueryExecutor::oneshot)): a single synchronous
//!   request with a hard row cap, for small interactive lookups.

use crate::backend::http::SplunkClient;
use crate::backend::{JobHandle, JobOptions, JobStats, OneshotOptions, ResultRecord, Row, SearchBackend};
use crate::config::ExecutorConfig;
use crate::error::{JobFailure, SearchError};
use crate::poll::{sleep_unless_cancelled, Backoff, CancelToken};
use crate::table::{unique_sorted, ResultTable, SYSTEM_FIELDS};
use gak_query::{field_summary_query, unique_values_query, FieldValue};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Lifecycle of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Created,
    Polling,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Polling => write!(f, "polling"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A finished tracked job and every row it produced.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub handle: JobHandle,
    pub stats: JobStats,
    pub rows: Vec<Row>,
}

/// Parameters of a one-shot search.
#[derive(Debug, Clone, PartialEq)]
pub struct OneshotRequest {
    /// Row cap; `None` uses `ExecutorConfig::oneshot_count`.
    pub count: Option<usize>,
    /// Fields removed from every row; `None` keeps everything.
    pub drop_fields: Option<Vec<String>>,
}

impl Default for OneshotRequest {
    fn default() -> Self {
        Self {
            count: None,
            drop_fields: Some(SYSTEM_FIELDS.iter().map(|f| f.to_string()).collect()),
        }
    }
}

impl OneshotRequest {
    /// No drop-list at all.
    pub fn keep_all() -> Self {
        Self {
            count: None,
            drop_fields: None,
        }
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn drop_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drop_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

pub struct QueryExecutor<B: SearchBackend> {
    backend: B,
    config: ExecutorConfig,
}

impl<B: SearchBackend> QueryExecutor<B> {
    pub fn new(backend: B, config: ExecutorConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Job options carrying the configured `max_count`.
    pub fn job_options(&self) -> JobOptions {
        JobOptions {
            max_count: self.config.max_count,
            ..JobOptions::default()
        }
    }

    /// Submit `query` as a tracked job, wait for it and collect all rows.
    pub fn run_job(
        &mut self,
        query: &str,
        opts: &JobOptions,
        cancel: &CancelToken,
    ) -> Result<JobOutcome, JobFailure> {
        tracing::debug!(query, "submitting search job");
        let handle = self
            .backend
            .submit(query, opts)
            .map_err(|e| failed(JobState::Created, Vec::new(), e))?;
        tracing::debug!(sid = %handle, state = %JobState::Created, "job submitted");

        let stats = match self.wait_for(&handle, cancel) {
            Ok(stats) => stats,
            Err(e) => {
                if matches!(e, SearchError::Timeout { .. } | SearchError::Cancelled { .. }) {
                    self.abandon(&handle);
                }
                return Err(failed(JobState::Polling, Vec::new(), e));
            }
        };
        tracing::debug!(sid = %handle, state = %JobState::Done, results = stats.result_count, "job finished");

        let rows = self.fetch_all(&handle, stats.result_count, cancel)?;
        Ok(JobOutcome {
            handle,
            stats,
            rows,
        })
    }

    /// [`run_job`](Self::run_job), collected into a table.
    pub fn to_table(
        &mut self,
        query: &str,
        opts: &JobOptions,
        cancel: &CancelToken,
    ) -> Result<ResultTable, JobFailure> {
        let outcome = self.run_job(query, opts, cancel)?;
        Ok(ResultTable::from_rows(outcome.rows))
    }

    fn wait_for(&mut self, handle: &JobHandle, cancel: &CancelToken) -> Result<JobStats, SearchError> {
        let started = Instant::now();
        let limit = self.config.job_timeout();
        let mut backoff = Backoff::new(self.config.poll_initial(), self.config.poll_max());
        tracing::debug!(sid = %handle, state = %JobState::Polling, "waiting for job");

        loop {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled {
                    sid: handle.sid.clone(),
                });
            }

            match self.backend.poll(handle)? {
                Some(stats) if stats.is_failed => {
                    return Err(SearchError::JobFailed {
                        sid: handle.sid.clone(),
                        messages: stats.messages,
                    });
                }
                Some(stats) if stats.is_done => {
                    tracing::info!("{}", stats);
                    return Ok(stats);
                }
                Some(stats) => tracing::info!("{}", stats),
                None => tracing::debug!(sid = %handle, "job status not ready"),
            }

            let elapsed = started.elapsed();
            if elapsed >= limit {
                return Err(SearchError::Timeout {
                    sid: handle.sid.clone(),
                    limit,
                });
            }

            let delay = backoff.next_delay().min(limit - elapsed);
            if !sleep_unless_cancelled(delay, cancel) {
                return Err(SearchError::Cancelled {
                    sid: handle.sid.clone(),
                });
            }
        }
    }

    /// Best-effort stop of a server-side job nobody waits for anymore.
    fn abandon(&mut self, handle: &JobHandle) {
        if let Err(e) = self.backend.cancel(handle) {
            tracing::warn!(sid = %handle, "could not cancel search job: {}", e);
        }
    }

    /// Page through `total` results. On failure the rows read so far travel
    /// inside the error.
    fn fetch_all(
        &mut self,
        handle: &JobHandle,
        total: u64,
        cancel: &CancelToken,
    ) -> Result<Vec<Row>, JobFailure> {
        let page_size = self.config.page_size.max(1);
        let mut rows: Vec<Row> = Vec::with_capacity(total.min(page_size as u64) as usize);
        let mut offset = 0u64;

        while offset < total {
            if cancel.is_cancelled() {
                self.abandon(handle);
                let source = SearchError::Cancelled {
                    sid: handle.sid.clone(),
                };
                return Err(failed(JobState::Done, rows, source));
            }

            let records = match self.backend.fetch(handle, page_size, offset) {
                Ok(records) => records,
                Err(e) => return Err(failed(JobState::Done, rows, e)),
            };

            let before = rows.len();
            collect_rows(records, &mut rows);
            let read = (rows.len() - before) as u64;
            if read == 0 {
                tracing::warn!(
                    sid = %handle,
                    "job reported {} results but returned none after offset {}",
                    total,
                    offset
                );
                break;
            }
            offset += read;
        }

        Ok(rows)
    }

    /// Run `query` synchronously. Returns at most the requested number of
    /// rows, with the request's drop-list applied.
    pub fn oneshot(&mut self, query: &str, request: &OneshotRequest) -> Result<ResultTable, SearchError> {
        let opts = OneshotOptions {
            count: request.count.unwrap_or(self.config.oneshot_count),
        };
        tracing::debug!(query, count = opts.count, "running one-shot search");

        let records = self.backend.oneshot(query, &opts)?;
        let mut rows = Vec::with_capacity(records.len());
        collect_rows(records, &mut rows);
        rows.truncate(opts.count);

        let mut table = ResultTable::from_rows(rows);
        if let Some(fields) = &request.drop_fields {
            table.drop_fields(fields.as_slice());
        }
        Ok(table)
    }

    /// Distinct values of `field` in `index`, numerically sorted when every
    /// value is a number and in natural order otherwise.
    pub fn unique_values(&mut self, index: &str, field: &str) -> Result<Vec<FieldValue>, SearchError> {
        let query = unique_values_query(index, field)?;
        let table = self.oneshot(&query, &OneshotRequest::keep_all())?;
        Ok(unique_sorted(table.column(field)))
    }

    /// Field names present in `index`, from a field summary job.
    pub fn field_names(&mut self, index: &str, cancel: &CancelToken) -> Result<Vec<String>, SearchError> {
        let query = field_summary_query(index)?;
        let opts = self.job_options();
        let table = self
            .to_table(&query, &opts, cancel)
            .map_err(JobFailure::into_error)?;
        Ok(table
            .column("field")
            .into_iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect())
    }

    pub fn indexes(&mut self) -> Result<Vec<String>, SearchError> {
        self.backend.list_indexes()
    }
}

impl QueryExecutor<SplunkClient> {
    /// Release the backend session.
    pub fn close(self) {
        self.backend.close();
    }
}

fn failed(state: JobState, partial: Vec<Row>, source: SearchError) -> JobFailure {
    tracing::error!(
        state = %JobState::Failed,
        from = %state,
        partial_rows = partial.len(),
        "search job failed: {}",
        source
    );
    JobFailure::new(state, partial, source)
}

/// Keep rows, log and skip informational messages.
fn collect_rows(records: Vec<ResultRecord>, rows: &mut Vec<Row>) {
    for record in records {
        match record {
            ResultRecord::Row(row) => rows.push(row),
            ResultRecord::Message { kind, text } => {
                tracing::warn!("Skipping {} message from backend: {}", kind, text)
            }
        }
    }
}
