//! Error types for the audit exporter
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Errors fall into the categories described by [`ErrorKind`]. Configuration,
//! authentication and API errors end a run; serialization and delivery errors
//! are logged at the point they occur and the run carries on.

use thiserror::Error;

/// The main error type for the exporter
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed{}: {body}", fmt_status(.status))]
    Auth { status: Option<u16>, body: String },

    // ============================================================================
    // Remote API Errors
    // ============================================================================
    #[error("API request failed{}: {body}", fmt_status(.status))]
    Api { status: Option<u16>, body: String },

    // ============================================================================
    // HTTP Errors (transport level, classified by callers)
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Failed to serialize record: {message}")]
    Serialization { message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // Delivery Errors
    // ============================================================================
    #[error("Delivery failed: {message}")]
    Delivery { message: String, retryable: bool },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Broad error categories, used to decide whether a run survives an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid configuration
    Configuration,
    /// Token exchange rejected or unreachable
    Auth,
    /// Page fetch rejected or unreachable
    Api,
    /// A record could not be serialized
    Serialization,
    /// A sink rejected a batch or could not be reached
    Delivery,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Whether an error of this kind ends the run
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorKind::Serialization | ErrorKind::Delivery)
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an auth error carrying the identity provider's status and body
    pub fn auth(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::Auth {
            status,
            body: body.into(),
        }
    }

    /// Create an API error carrying the remote status and body
    pub fn api(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a delivery error
    pub fn delivery(message: impl Into<String>, retryable: bool) -> Self {
        Self::Delivery {
            message: message.into(),
            retryable,
        }
    }

    /// Re-classify a transport level error as an authentication failure
    pub fn into_auth(self) -> Self {
        if self.kind() == ErrorKind::Configuration {
            return self;
        }
        match self {
            Error::Auth { .. } => self,
            Error::HttpStatus { status, body } => Error::auth(Some(status), body),
            other => {
                let status = other.status();
                Error::auth(status, other.to_string())
            }
        }
    }

    /// Re-classify a transport level error as a remote API failure
    pub fn into_api(self) -> Self {
        match self {
            Error::Api { .. } => self,
            Error::HttpStatus { status, body } => Error::api(Some(status), body),
            other => {
                let status = other.status();
                Error::api(status, other.to_string())
            }
        }
    }

    /// Re-classify a transport level error as a delivery failure
    pub fn into_delivery(self) -> Self {
        match self {
            Error::Delivery { .. } => self,
            other => {
                let retryable = other.is_retryable();
                Error::delivery(other.to_string(), retryable)
            }
        }
    }

    /// HTTP status attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Auth { status, .. } | Error::Api { status, .. } => *status,
            Error::HttpStatus { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. }
            | Error::MissingConfigField { .. }
            | Error::InvalidConfigValue { .. }
            | Error::YamlParse(_)
            | Error::InvalidUrl(_) => ErrorKind::Configuration,
            Error::Auth { .. } => ErrorKind::Auth,
            Error::Api { .. }
            | Error::Http(_)
            | Error::HttpStatus { .. }
            | Error::RateLimited { .. }
            | Error::Timeout { .. }
            | Error::Decode { .. } => ErrorKind::Api,
            Error::Serialization { .. } => ErrorKind::Serialization,
            Error::Delivery { .. } => ErrorKind::Delivery,
            Error::Io(_) | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error ends the run
    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            Error::Auth {
                status: Some(status),
                ..
            }
            | Error::Api {
                status: Some(status),
                ..
            } => is_retryable_status(*status),
            Error::Delivery { retryable, .. } => *retryable,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::Io(e.into())
        } else {
            Error::serialization(e.to_string())
        }
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the exporter
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("client_id");
        assert_eq!(err.to_string(), "Missing required config field: client_id");

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");

        let err = Error::auth(Some(401), "invalid_grant");
        assert_eq!(
            err.to_string(),
            "Authentication failed (HTTP 401): invalid_grant"
        );

        let err = Error::api(None, "connection refused");
        assert_eq!(err.to_string(), "API request failed: connection refused");
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::RateLimited {
            retry_after_seconds: 60
        }
        .is_retryable());
        assert!(Error::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(Error::http_status(429, "").is_retryable());
        assert!(Error::http_status(500, "").is_retryable());
        assert!(Error::http_status(503, "").is_retryable());
        assert!(Error::api(Some(502), "").is_retryable());
        assert!(Error::delivery("queue down", true).is_retryable());

        assert!(!Error::http_status(400, "").is_retryable());
        assert!(!Error::http_status(401, "").is_retryable());
        assert!(!Error::auth(Some(401), "").is_retryable());
        assert!(!Error::delivery("rejected", false).is_retryable());
        assert!(!Error::config("test").is_retryable());
    }

    #[test]
    fn test_kind_and_fatality() {
        assert_eq!(Error::missing_field("x").kind(), ErrorKind::Configuration);
        assert_eq!(Error::auth(Some(401), "").kind(), ErrorKind::Auth);
        assert_eq!(Error::api(Some(500), "").kind(), ErrorKind::Api);
        assert_eq!(Error::serialization("bad").kind(), ErrorKind::Serialization);
        assert_eq!(Error::delivery("down", true).kind(), ErrorKind::Delivery);

        assert!(Error::missing_field("x").is_fatal());
        assert!(Error::auth(None, "").is_fatal());
        assert!(Error::api(None, "").is_fatal());
        assert!(!Error::serialization("bad").is_fatal());
        assert!(!Error::delivery("down", false).is_fatal());
    }

    #[test]
    fn test_reclassification() {
        let err = Error::http_status(401, "bad creds").into_auth();
        assert!(matches!(err, Error::Auth { status: Some(401), .. }));

        let err = Error::Timeout { timeout_ms: 30_000 }.into_api();
        assert!(matches!(err, Error::Api { status: None, .. }));
        assert!(err.to_string().contains("30000ms"));

        let err = Error::http_status(503, "busy").into_delivery();
        assert!(matches!(err, Error::Delivery { retryable: true, .. }));

        let err = Error::missing_field("password").into_auth();
        assert!(matches!(err, Error::MissingConfigField { .. }));
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let wrapped = result.context("outer");
        assert!(wrapped
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
