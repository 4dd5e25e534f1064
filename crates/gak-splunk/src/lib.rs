//! # gak-splunk: The Engine of gak
//!
//! Executes search strings produced by `gak-query` against Splunk.
//!
//! ## Layers
//!
//! - [`backend`]: the submit/poll/fetch/oneshot contract and its REST client.
//! - [`executor`]: tracked jobs with backoff, timeout and cancellation, plus
//!   one-shot lookups, unique values and field listings.
//! - [`table`]: result rows, display projections and column casting.
//! - [`config`]: `SPLUNK_*` environment settings and the `[executor]` TOML table.
//!
//! ## Example
//!
//! ```no_run
//! use gak_splunk::{CancelToken, ExecutorConfig, QueryExecutor, SplunkClient, SplunkConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SplunkClient::connect(&SplunkConfig::from_env()?)?;
//! let mut exec = QueryExecutor::new(client, ExecutorConfig::default());
//! let opts = exec.job_options();
//! let table = exec.to_table("search index=main | head 10", &opts, &CancelToken::new())?;
//! println!("{} rows", table.len());
//! exec.close();
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod executor;
pub mod poll;
pub mod table;

#[cfg(test)]
mod testing;

pub use backend::http::SplunkClient;
pub use backend::{
    JobHandle, JobOptions, JobStats, OneshotOptions, ResultRecord, Row, SearchBackend, TimeBound,
};
pub use config::{Credentials, ExecutorConfig, SplunkConfig};
pub use error::{ConfigError, JobFailure, SearchError};
pub use executor::{JobOutcome, JobState, OneshotRequest, QueryExecutor};
pub use poll::{Backoff, CancelToken};
pub use table::{ColumnType, ResultTable, SYSTEM_FIELDS};
