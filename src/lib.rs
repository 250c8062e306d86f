// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::needless_pass_by_value)]

//! # audit-export
//!
//! Incremental export of setup audit trail entries from a paginated REST API
//! into size-bounded batches, delivered to a message queue or a local file.
//!
//! ## Features
//!
//! - **Password grant auth**: one token per run, tenant URL from the token response
//! - **Cursor pagination**: the server's continuation cursor drives the loop
//! - **Size-bounded batches**: compact JSON byte budget, flushed at every page end
//! - **Two sinks**: SQS messages through `aws-sdk-sqs`, or an append-only file
//! - **Defined failure policy**: auth and fetch failures stop the run, delivery
//!   failures are logged and skipped
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use audit_export::config::ExportConfig;
//! use audit_export::engine::{ExportPipeline, PipelineConfig};
//!
//! let config = ExportConfig::from_env()?;
//! config.validate()?;
//!
//! let http = config.http.client_config();
//! let provider = PasswordGrantProvider::new(&config.login_url, http.clone())?;
//! let source = QueryClient::new(&config.api_version, http)?;
//! let sink = config.sink_config()?.build(&config.http.delivery_config(), "run-1").await?;
//!
//! let report = ExportPipeline::new(Box::new(provider), Box::new(source), sink)
//!     .run(&config.credentials, &config.query())
//!     .await;
//! println!("{}", report.summary());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  token  ┌──────────────┐  page  ┌─────────┐  batch  ┌────────────┐
//! │   Auth   │ ──────▶ │  Pagination  │ ─────▶ │  Batch  │ ──────▶ │    Sink    │
//! │ password │         │ cursor-driven│        │ ≤ bytes │         │ queue/file │
//! └──────────┘         └──────────────┘        └─────────┘         └────────────┘
//!        ▲                    ▲                                          ▲
//!        └──────────── HTTP: timeout, retry, backoff, rate limit ────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the exporter
pub mod error;

/// Common types and type aliases
pub mod types;

/// Credential exchange
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Audit trail query construction
pub mod query;

/// Cursor pagination over the query API
pub mod pagination;

/// Size-bounded batching
pub mod batch;

/// Batch delivery targets
pub mod sink;

/// Export pipeline
pub mod engine;

/// Run configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use config::ExportConfig;
pub use engine::{ExportPipeline, RunOutcome, RunReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
