//! Engine types
//!
//! Run state, statistics and configuration for the export pipeline.

use crate::batch::DEFAULT_MAX_BATCH_BYTES;
use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Where a run is in its life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing done yet
    Init,
    /// Token acquired
    Authenticated,
    /// A page is being batched and delivered
    PageReady,
    /// All pages processed
    Done,
    /// Stopped on a fatal error
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Authenticated => "authenticated",
            Self::PageReady => "page_ready",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Batch ceiling in bytes
    pub max_batch_bytes: usize,
    /// Stop after this many pages (0 = unlimited)
    pub max_pages: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            max_pages: 0,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch ceiling
    #[must_use]
    pub fn with_max_batch_bytes(mut self, max_bytes: usize) -> Self {
        self.max_batch_bytes = max_bytes;
        self
    }

    /// Set the page limit
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }
}

/// Counters collected during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Pages fetched
    pub pages_fetched: u64,
    /// Records received across all pages
    pub records_fetched: u64,
    /// Records dropped because they could not be serialized
    pub records_skipped: u64,
    /// Batches the sink accepted
    pub batches_delivered: u64,
    /// Batches the sink rejected
    pub batches_failed: u64,
    /// Records inside accepted batches
    pub records_delivered: u64,
    /// Payload bytes the sink accepted
    pub bytes_delivered: u64,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl RunStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a fetched page
    pub fn add_page(&mut self, records: usize) {
        self.pages_fetched += 1;
        self.records_fetched += records as u64;
    }

    /// Count a skipped record
    pub fn add_skipped(&mut self) {
        self.records_skipped += 1;
    }

    /// Count an accepted batch
    pub fn add_delivered(&mut self, records: usize, bytes: usize) {
        self.batches_delivered += 1;
        self.records_delivered += records as u64;
        self.bytes_delivered += bytes as u64;
    }

    /// Count a rejected batch
    pub fn add_failed(&mut self) {
        self.batches_failed += 1;
    }
}

/// Status pair reported to the caller of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    /// 200 on success, 500 on failure
    pub status_code: u16,
    /// `SUCCESS` or `FAILED`
    pub body: &'static str,
}

impl RunOutcome {
    /// Successful run
    pub const SUCCESS: Self = Self {
        status_code: 200,
        body: "SUCCESS",
    };

    /// Failed run
    pub const FAILED: Self = Self {
        status_code: 500,
        body: "FAILED",
    };

    /// Whether this is the success outcome
    pub fn is_success(&self) -> bool {
        self.status_code == Self::SUCCESS.status_code
    }
}

/// Everything known about a finished run
#[derive(Debug)]
pub struct RunReport {
    /// Run identifier
    pub run_id: String,
    /// Final state
    pub state: RunState,
    /// Counters
    pub stats: RunStats,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when `max_pages` cut the run short
    pub stopped_early: bool,
    /// The fatal error, for failed runs
    pub error: Option<Error>,
}

impl RunReport {
    /// Start a report for a new run
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: RunState::Init,
            stats: RunStats::default(),
            started_at: Utc::now(),
            finished_at: None,
            stopped_early: false,
            error: None,
        }
    }

    /// Whether the run completed
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    /// 200/500 outcome
    pub fn outcome(&self) -> RunOutcome {
        if self.is_success() {
            RunOutcome::SUCCESS
        } else {
            RunOutcome::FAILED
        }
    }

    /// JSON summary for printing
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id,
            "outcome": self.outcome(),
            "state": self.state,
            "stats": self.stats,
            "started_at": self.started_at.to_rfc3339(),
            "finished_at": self.finished_at.map(|t| t.to_rfc3339()),
            "stopped_early": self.stopped_early,
            "error": self.error.as_ref().map(ToString::to_string),
        })
    }
}

/// Fresh run identifier derived from the current time
pub fn new_run_id() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string()
}
