//! # Splunk REST Client
//!
//! Blocking client for the Splunk management API (default port 8089).
//! Construct once per process, reuse across queries, [`close`](SplunkClient::close)
//! explicitly when done.

use super::{wire, JobHandle, JobOptions, JobStats, OneshotOptions, ResultRecord, SearchBackend};
use crate::config::{Credentials, SplunkConfig};
use crate::error::SearchError;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde_json::Value;

pub struct SplunkClient {
    http: Client,
    base_url: String,
    host: String,
    authorization: String,
    /// Set when the client logged in itself and owns the session.
    session_key: Option<String>,
}

impl SplunkClient {
    /// Build the HTTP client and authenticate. Any failure here is fatal.
    pub fn connect(config: &SplunkConfig) -> Result<Self, SearchError> {
        let connection_error = |reason: String| SearchError::Connection {
            host: config.host.clone(),
            reason,
        };

        let http = Client::builder()
            .timeout(config.http_timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| connection_error(e.to_string()))?;
        let base_url = config.base_url();

        let (authorization, session_key) = match &config.credentials {
            Credentials::Token(token) => (format!("Bearer {}", token), None),
            Credentials::Password { username, password } => {
                let key = login(&http, &base_url, username, password)
                    .map_err(|e| connection_error(e.to_string()))?;
                (format!("Splunk {}", key), Some(key))
            }
        };

        tracing::debug!("Splunk connection established to {}", base_url);

        Ok(Self {
            http,
            base_url,
            host: config.host.clone(),
            authorization,
            session_key,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// End the session. Token-authenticated clients have nothing to release.
    pub fn close(self) {
        let Some(key) = &self.session_key else {
            return;
        };
        let url = format!(
            "{}/services/authentication/httpauth-tokens/{}",
            self.base_url, key
        );
        match self.authorized(self.http.delete(&url)).send() {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("Splunk session closed")
            }
            Ok(resp) => tracing::warn!("Splunk logout returned HTTP {}", resp.status()),
            Err(e) => tracing::warn!("Splunk logout failed: {}", e),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("Authorization", &self.authorization)
    }

    fn send_json(&self, req: RequestBuilder) -> Result<Value, SearchError> {
        let resp = checked(self.authorized(req).send()?)?;
        Ok(resp.json::<Value>()?)
    }
}

fn login(http: &Client, base_url: &str, username: &str, password: &str) -> Result<String, SearchError> {
    let resp = http
        .post(format!("{}/services/auth/login", base_url))
        .form(&[
            ("username", username),
            ("password", password),
            ("output_mode", "json"),
        ])
        .send()?;
    let body: Value = checked(resp)?.json()?;
    wire::decode_session_key(&body)
}

/// Form for a tracked job. `count=0` lifts the per-request result cap;
/// `max_count` bounds what the job retains.
fn job_form(query: &str, opts: &JobOptions) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("search", query.to_string()),
        ("exec_mode", "normal".to_string()),
        ("count", "0".to_string()),
        ("max_count", opts.max_count.to_string()),
        ("output_mode", "json".to_string()),
    ];
    if let Some(t) = &opts.earliest_time {
        form.push(("earliest_time", t.to_param()));
    }
    if let Some(t) = &opts.latest_time {
        form.push(("latest_time", t.to_param()));
    }
    form
}

fn checked(resp: Response) -> Result<Response, SearchError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(SearchError::Http {
            status: status.as_u16(),
            body: resp.text().unwrap_or_default(),
        })
    }
}

impl SearchBackend for SplunkClient {
    fn submit(&mut self, query: &str, opts: &JobOptions) -> Result<JobHandle, SearchError> {
        let form = job_form(query, opts);
        let body = self.send_json(self.http.post(self.url("/services/search/jobs")).form(&form))?;
        let handle = wire::decode_sid(&body)?;
        tracing::debug!(sid = %handle, "search job created");
        Ok(handle)
    }

    fn poll(&mut self, job: &JobHandle) -> Result<Option<JobStats>, SearchError> {
        let url = self.url(&format!("/services/search/jobs/{}", job.sid));
        let resp = self
            .authorized(self.http.get(&url).query(&[("output_mode", "json")]))
            .send()?;

        // 204 until the job's status document exists
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body: Value = checked(resp)?.json()?;
        wire::decode_job_status(&body)
    }

    fn fetch(
        &mut self,
        job: &JobHandle,
        count: usize,
        offset: u64,
    ) -> Result<Vec<ResultRecord>, SearchError> {
        let url = self.url(&format!("/services/search/jobs/{}/results", job.sid));
        let body = self.send_json(self.http.get(&url).query(&[
            ("output_mode", "json".to_string()),
            ("count", count.to_string()),
            ("offset", offset.to_string()),
        ]))?;
        wire::decode_results(&body)
    }

    fn oneshot(
        &mut self,
        query: &str,
        opts: &OneshotOptions,
    ) -> Result<Vec<ResultRecord>, SearchError> {
        let form = [
            ("search", query.to_string()),
            ("exec_mode", "oneshot".to_string()),
            ("count", opts.count.to_string()),
            ("output_mode", "json".to_string()),
            ("adhoc_search_level", "verbose".to_string()),
        ];
        let body = self.send_json(self.http.post(self.url("/services/search/jobs")).form(&form))?;
        wire::decode_results(&body)
    }

    fn list_indexes(&mut self) -> Result<Vec<String>, SearchError> {
        tracing::debug!("Retrieving index information");
        let body = self.send_json(
            self.http
                .get(self.url("/services/data/indexes"))
                .query(&[("output_mode", "json"), ("count", "0")]),
        )?;
        wire::decode_index_names(&body)
    }

    fn cancel(&mut self, job: &JobHandle) -> Result<(), SearchError> {
        let url = self.url(&format!("/services/search/jobs/{}/control", job.sid));
        let req = self
            .http
            .post(&url)
            .form(&[("action", "cancel"), ("output_mode", "json")]);
        checked(self.authorized(req).send()?)?;
        tracing::debug!(sid = %job, "search job cancelled");
        Ok(())
    }
}
