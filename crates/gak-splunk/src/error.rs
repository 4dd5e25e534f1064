//! Error taxonomy for configuration, transport and job execution.

use crate::backend::Row;
use crate::executor::JobState;
use crate::table::ColumnType;
use gak_query::QueryError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors. Required settings are never silently defaulted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything that can go wrong talking to the search backend.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Backend unreachable or credentials rejected while connecting. Fatal.
    #[error("failed to connect to {host}: {reason}")]
    Connection { host: String, reason: String },

    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode backend response: {0}")]
    Decode(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    /// The backend reported the job itself as failed.
    #[error("job {sid} failed on the search head: {}", .messages.join("; "))]
    JobFailed { sid: String, messages: Vec<String> },

    #[error("job {sid} did not finish within {limit:?}")]
    Timeout { sid: String, limit: Duration },

    #[error("job {sid} was cancelled")]
    Cancelled { sid: String },

    /// Zero rows. A valid outcome, surfaced only when a caller asks for it.
    #[error("search returned no rows")]
    EmptyResult,

    #[error("cannot cast {value} in column '{column}' to {target}")]
    Cast {
        column: String,
        value: String,
        target: ColumnType,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A tracked job that ended in the `Failed` state.
///
/// Rows decoded before the failure are kept in `partial` rather than thrown
/// away; callers decide whether a truncated result is usable.
#[derive(Debug, Error)]
#[error("search job failed in state {state}: {source}")]
pub struct JobFailure {
    pub state: JobState,
    pub partial: Vec<Row>,
    #[source]
    pub source: SearchError,
}

impl JobFailure {
    pub fn new(state: JobState, partial: Vec<Row>, source: SearchError) -> Self {
        Self {
            state,
            partial,
            source,
        }
    }

    /// Drop the partial rows and keep the cause.
    pub fn into_error(self) -> SearchError {
        self.source
    }
}
