//! Export configuration
//!
//! One `ExportConfig` is built at startup from an optional YAML (or JSON)
//! file, overlaid with environment variables, validated, and then passed by
//! reference to everything that needs it.

use crate::auth::{Credentials, DEFAULT_LOGIN_URL};
use crate::batch::DEFAULT_MAX_BATCH_BYTES;
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::pagination::DEFAULT_API_VERSION;
use crate::query::{AuditQuery, QueryWindow};
use crate::sink::{FileSinkConfig, QueueSinkConfig, SinkConfig};
use crate::types::BackoffType;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Environment Variables
// ============================================================================

/// Environment variable names recognised by [`ExportConfig::apply_env`]
pub mod env {
    /// Connected app client id
    pub const CLIENT_ID: &str = "SALESFORCE_CLIENT_ID";
    /// Connected app client secret
    pub const CLIENT_SECRET: &str = "SALESFORCE_CLIENT_SECRET";
    /// Integration user name
    pub const USERNAME: &str = "SALESFORCE_USERNAME";
    /// Integration user password
    pub const PASSWORD: &str = "SALESFORCE_PASSWORD";
    /// Token endpoint
    pub const LOGIN_URL: &str = "SALESFORCE_LOGIN_URL";
    /// REST API version
    pub const API_VERSION: &str = "SALESFORCE_API_VERSION";
    /// Destination queue
    pub const QUEUE_URL: &str = "AWS_SQS_QUEUE_URL";
    /// SQS endpoint override
    pub const SQS_ENDPOINT_URL: &str = "AWS_SQS_ENDPOINT_URL";
    /// Static access key id for the queue
    pub const ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID_1";
    /// Static secret access key for the queue
    pub const SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY_1";
    /// File sink path
    pub const OUTPUT_FILE_PATH: &str = "OUTPUT_FILE_PATH";
    /// Batch ceiling in bytes
    pub const MAX_BATCH_BYTES: &str = "MAX_BATCH_BYTES";
    /// Query time window
    pub const QUERY_WINDOW: &str = "QUERY_WINDOW";
    /// Per-request timeout in seconds
    pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete exporter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Password grant credentials
    #[serde(default)]
    pub credentials: Credentials,

    /// Token endpoint
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// REST API version, e.g. `v55.0`
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Where batches go
    #[serde(default)]
    pub sink: Option<SinkConfig>,

    /// Batch ceiling in bytes
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,

    /// Which audit entries to export
    #[serde(default)]
    pub query_window: QueryWindow,

    /// HTTP settings for token and query calls
    #[serde(default)]
    pub http: HttpSettings,

    /// Stop after this many pages (0 = unlimited)
    #[serde(default)]
    pub max_pages: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            login_url: default_login_url(),
            api_version: default_api_version(),
            sink: None,
            max_batch_bytes: default_max_batch_bytes(),
            query_window: QueryWindow::default(),
            http: HttpSettings::default(),
            max_pages: 0,
        }
    }
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_max_batch_bytes() -> usize {
    DEFAULT_MAX_BATCH_BYTES
}

// ============================================================================
// HTTP Settings
// ============================================================================

/// Timeouts, retries and rate limiting for outbound calls
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSettings {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries on retryable failures (0 = a single attempt)
    #[serde(default)]
    pub max_retries: u32,

    /// Backoff between retries
    #[serde(default)]
    pub backoff: BackoffType,

    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Request rate ceiling, unlimited when unset
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            backoff: BackoffType::Exponential,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            requests_per_second: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

impl HttpSettings {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Client settings for token and query calls
    pub fn client_config(&self) -> HttpClientConfig {
        let builder = HttpClientConfig::builder()
            .timeout(self.timeout())
            .max_retries(self.max_retries)
            .backoff(
                self.backoff,
                Duration::from_millis(self.initial_backoff_ms),
                Duration::from_millis(self.max_backoff_ms),
            );
        let builder = match self.requests_per_second {
            Some(rps) => builder.rate_limit(RateLimiterConfig::new(rps, 1)),
            None => builder.no_rate_limit(),
        };
        builder.build()
    }

    /// Client settings for deliveries
    ///
    /// Deliveries share the timeout but never the retry count; a sink
    /// carries its own.
    pub fn delivery_config(&self) -> HttpClientConfig {
        let mut config = self.client_config();
        config.max_retries = 0;
        config.rate_limit = None;
        config
    }
}

// ============================================================================
// Loading
// ============================================================================

impl ExportConfig {
    /// Load from a YAML or JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse from a YAML (or JSON) string
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Build from the process environment alone
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_process_env()?;
        Ok(config)
    }

    /// Overlay values from the process environment
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment lookup
    ///
    /// Set, non-empty variables win over file values. `AWS_SQS_QUEUE_URL`
    /// (or the endpoint override) and `OUTPUT_FILE_PATH` select the sink;
    /// setting both is an error. The static key pair only applies to a
    /// queue sink.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = var(env::CLIENT_ID) {
            self.credentials.client_id = v;
        }
        if let Some(v) = var(env::CLIENT_SECRET) {
            self.credentials.client_secret = v;
        }
        if let Some(v) = var(env::USERNAME) {
            self.credentials.username = v;
        }
        if let Some(v) = var(env::PASSWORD) {
            self.credentials.password = v;
        }
        if let Some(v) = var(env::LOGIN_URL) {
            self.login_url = v;
        }
        if let Some(v) = var(env::API_VERSION) {
            self.api_version = v;
        }
        if let Some(v) = var(env::MAX_BATCH_BYTES) {
            self.max_batch_bytes = v
                .parse()
                .map_err(|e| Error::invalid_value(env::MAX_BATCH_BYTES, format!("'{v}': {e}")))?;
        }
        if let Some(v) = var(env::QUERY_WINDOW) {
            self.query_window = v.parse()?;
        }
        if let Some(v) = var(env::REQUEST_TIMEOUT_SECS) {
            self.http.timeout_secs = v.parse().map_err(|e| {
                Error::invalid_value(env::REQUEST_TIMEOUT_SECS, format!("'{v}': {e}"))
            })?;
        }

        let queue_url = var(env::QUEUE_URL);
        let endpoint = var(env::SQS_ENDPOINT_URL);
        let output_path = var(env::OUTPUT_FILE_PATH);

        if (queue_url.is_some() || endpoint.is_some()) && output_path.is_some() {
            return Err(Error::config(format!(
                "{} and {} select different sinks, set only one",
                env::QUEUE_URL,
                env::OUTPUT_FILE_PATH
            )));
        }

        if queue_url.is_some() || endpoint.is_some() {
            let mut queue = match self.sink.take() {
                Some(SinkConfig::Queue(queue)) => queue,
                _ => QueueSinkConfig::new(""),
            };
            if let Some(v) = queue_url {
                queue.queue_url = v;
            }
            if endpoint.is_some() {
                queue.endpoint_url = endpoint;
            }
            self.sink = Some(SinkConfig::Queue(queue));
        } else if let Some(path) = output_path {
            let file = match self.sink.take() {
                Some(SinkConfig::File(file)) => FileSinkConfig { path: path.into(), ..file },
                _ => FileSinkConfig::new(path),
            };
            self.sink = Some(SinkConfig::File(file));
        }

        if let Some(SinkConfig::Queue(queue)) = self.sink.as_mut() {
            if let Some(v) = var(env::ACCESS_KEY_ID) {
                queue.access_key_id = Some(v);
            }
            if let Some(v) = var(env::SECRET_ACCESS_KEY) {
                queue.secret_access_key = Some(v);
            }
        }

        Ok(())
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Check everything needed before the first network call
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        self.validate_settings()?;
        self.sink_config()?.validate()
    }

    /// Check all settings except credentials and sink presence
    pub fn validate_settings(&self) -> Result<()> {
        url::Url::parse(&self.login_url)
            .map_err(|e| Error::invalid_value("login_url", e.to_string()))?;
        if self.api_version.trim().is_empty() {
            return Err(Error::missing_field("api_version"));
        }
        if self.max_batch_bytes == 0 {
            return Err(Error::invalid_value(
                "max_batch_bytes",
                "must be greater than 0",
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_value(
                "http.timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.http.requests_per_second == Some(0) {
            return Err(Error::invalid_value(
                "http.requests_per_second",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// The configured sink
    pub fn sink_config(&self) -> Result<&SinkConfig> {
        self.sink.as_ref().ok_or_else(|| {
            Error::config(format!(
                "no sink configured: set sink.type, {} or {}",
                env::QUEUE_URL,
                env::OUTPUT_FILE_PATH
            ))
        })
    }

    /// The query this configuration exports
    pub fn query(&self) -> AuditQuery {
        AuditQuery::new(self.query_window)
    }
}
