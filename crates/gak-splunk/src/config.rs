//! # Configuration
//!
//! Connection settings come from the environment (`SPLUNK_*`), execution
//! tuning from an optional TOML file:
//!
//! ```toml
//! [executor]
//! poll_initial_ms = 100
//! poll_max_ms = 5000
//! job_timeout_secs = 3600
//! page_size = 50000
//! oneshot_count = 1000
//! max_count = 30000000
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8089;
pub const DEFAULT_SCHEME: &str = "https";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Connection
// =============================================================================

/// How to authenticate against the management port.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Exchanged for a session key at connect time.
    Password { username: String, password: String },
    /// Pre-issued authentication token, sent as a bearer header.
    Token(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplunkConfig {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub credentials: Credentials,
    pub verify_tls: bool,
    pub http_timeout: Duration,
}

impl SplunkConfig {
    pub fn new(host: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            scheme: DEFAULT_SCHEME.to_string(),
            credentials,
            verify_tls: true,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Read `SPLUNK_HOST`, `SPLUNK_PORT`, `SPLUNK_SCHEME`, `SPLUNK_USERNAME`,
    /// `SPLUNK_PASSWORD`, `SPLUNK_TOKEN`, `SPLUNK_VERIFY_TLS` and
    /// `SPLUNK_TIMEOUT_SECS` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let host = get("SPLUNK_HOST").ok_or(ConfigError::Missing("SPLUNK_HOST"))?;

        let credentials = match get("SPLUNK_TOKEN") {
            Some(token) => Credentials::Token(token),
            None => {
                let username =
                    get("SPLUNK_USERNAME").ok_or(ConfigError::Missing("SPLUNK_USERNAME"))?;
                let password =
                    get("SPLUNK_PASSWORD").ok_or(ConfigError::Missing("SPLUNK_PASSWORD"))?;
                Credentials::Password { username, password }
            }
        };

        let mut config = Self::new(host, credentials);

        if let Some(port) = get("SPLUNK_PORT") {
            config.port = port.parse().map_err(|_| ConfigError::Invalid {
                var: "SPLUNK_PORT",
                reason: format!("'{}' is not a port number", port),
            })?;
        }
        if let Some(scheme) = get("SPLUNK_SCHEME") {
            if scheme != "http" && scheme != "https" {
                return Err(ConfigError::Invalid {
                    var: "SPLUNK_SCHEME",
                    reason: format!("expected http or https, got '{}'", scheme),
                });
            }
            config.scheme = scheme;
        }
        if let Some(verify) = get("SPLUNK_VERIFY_TLS") {
            config.verify_tls = parse_bool(&verify).ok_or_else(|| ConfigError::Invalid {
                var: "SPLUNK_VERIFY_TLS",
                reason: format!("'{}' is not a boolean", verify),
            })?;
        }
        if let Some(secs) = get("SPLUNK_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| ConfigError::Invalid {
                var: "SPLUNK_TIMEOUT_SECS",
                reason: format!("'{}' is not a number of seconds", secs),
            })?;
            config.http_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Execution tuning
// =============================================================================

#[derive(Debug, Deserialize, Default, Clone)]
pub struct FileConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// First sleep between status polls.
    #[serde(default = "default_poll_initial_ms")]
    pub poll_initial_ms: u64,
    /// Backoff ceiling.
    #[serde(default = "default_poll_max_ms")]
    pub poll_max_ms: u64,
    /// Upper bound on waiting for a tracked job.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// Rows per results request.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Row cap for one-shot searches.
    #[serde(default = "default_oneshot_count")]
    pub oneshot_count: usize,
    /// `max_count` handed to new jobs.
    #[serde(default = "default_max_count")]
    pub max_count: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_initial_ms: default_poll_initial_ms(),
            poll_max_ms: default_poll_max_ms(),
            job_timeout_secs: default_job_timeout_secs(),
            page_size: default_page_size(),
            oneshot_count: default_oneshot_count(),
            max_count: default_max_count(),
        }
    }
}

fn default_poll_initial_ms() -> u64 {
    100
}
fn default_poll_max_ms() -> u64 {
    5000
}
fn default_job_timeout_secs() -> u64 {
    3600
}
fn default_page_size() -> usize {
    50_000
}
fn default_oneshot_count() -> usize {
    1000
}
fn default_max_count() -> u64 {
    30_000_000
}

impl ExecutorConfig {
    /// Parse the `[executor]` table of a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(raw)?;
        Ok(file.executor)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn poll_initial(&self) -> Duration {
        Duration::from_millis(self.poll_initial_ms)
    }

    pub fn poll_max(&self) -> Duration {
        Duration::from_millis(self.poll_max_ms.max(self.poll_initial_ms))
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_password_config() {
        let config = SplunkConfig::from_lookup(lookup(&[
            ("SPLUNK_HOST", "splunk.local"),
            ("SPLUNK_USERNAME", "admin"),
            ("SPLUNK_PASSWORD", "changeme"),
        ]))
        .unwrap();

        assert_eq!(config.base_url(), "https://splunk.local:8089");
        assert!(config.verify_tls);
        assert_eq!(
            config.credentials,
            Credentials::Password {
                username: "admin".into(),
                password: "changeme".into()
            }
        );
    }

    #[test]
    fn test_token_takes_precedence() {
        let config = SplunkConfig::from_lookup(lookup(&[
            ("SPLUNK_HOST", "splunk.local"),
            ("SPLUNK_TOKEN", "abc"),
            ("SPLUNK_PORT", "443"),
            ("SPLUNK_VERIFY_TLS", "false"),
        ]))
        .unwrap();

        assert_eq!(config.credentials, Credentials::Token("abc".into()));
        assert_eq!(config.port, 443);
        assert!(!config.verify_tls);
    }

    #[test]
    fn test_missing_settings_are_errors() {
        let err = SplunkConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SPLUNK_HOST")));

        let err = SplunkConfig::from_lookup(lookup(&[
            ("SPLUNK_HOST", "h"),
            ("SPLUNK_USERNAME", "admin"),
            ("SPLUNK_PASSWORD", " "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SPLUNK_PASSWORD")));
    }

    #[test]
    fn test_invalid_port() {
        let err = SplunkConfig::from_lookup(lookup(&[
            ("SPLUNK_HOST", "h"),
            ("SPLUNK_TOKEN", "t"),
            ("SPLUNK_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SPLUNK_PORT", .. }));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::Password {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{:?}", creds);
        assert!(shown.contains("admin"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_executor_defaults_and_overrides() {
        let config = ExecutorConfig::from_toml_str("").unwrap();
        assert_eq!(config, ExecutorConfig::default());

        let config = ExecutorConfig::from_toml_str(
            "[executor]\npoll_max_ms = 250\njob_timeout_secs = 10\n",
        )
        .unwrap();
        assert_eq!(config.poll_max_ms, 250);
        assert_eq!(config.job_timeout(), Duration::from_secs(10));
        assert_eq!(config.page_size, 50_000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ExecutorConfig::load(Path::new("/nonexistent/gak.toml")).unwrap();
        assert_eq!(config, ExecutorConfig::default());
    }
}
