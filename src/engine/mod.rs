//! Execution engine module
//!
//! Drives one export run: authenticate, page through the query, batch each
//! page and hand every sealed batch to the sink.
//!
//! # Overview
//!
//! The engine module provides:
//! - `ExportPipeline` - sequential fetch, batch and deliver loop
//! - `PipelineConfig` - batch ceiling and page limit
//! - `RunReport`, `RunStats`, `RunOutcome` - what a run produced
//!
//! Every network call finishes before the next one starts. Authentication,
//! sink open and page fetch failures end the run; a batch that fails to
//! serialize or deliver is logged, counted and dropped.

mod types;

pub use types::{new_run_id, PipelineConfig, RunOutcome, RunReport, RunState, RunStats};

use crate::auth::{CredentialProvider, Credentials};
use crate::batch::{Batch, Batcher};
use crate::error::Result;
use crate::pagination::{pages, PageSource};
use crate::query::AuditQuery;
use crate::sink::Sink;
use chrono::Utc;
use futures::StreamExt;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Export pipeline
pub struct ExportPipeline {
    provider: Box<dyn CredentialProvider>,
    source: Box<dyn PageSource>,
    sink: Box<dyn Sink>,
    config: PipelineConfig,
    run_id: String,
}

impl ExportPipeline {
    /// Create a pipeline from its three collaborators
    pub fn new(
        provider: Box<dyn CredentialProvider>,
        source: Box<dyn PageSource>,
        sink: Box<dyn Sink>,
    ) -> Self {
        Self {
            provider,
            source,
            sink,
            config: PipelineConfig::default(),
            run_id: new_run_id(),
        }
    }

    /// Set pipeline configuration
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the run id
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run identifier
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Execute one run
    ///
    /// Never returns early with an error: the report carries the final
    /// state and, for failed runs, the error that ended it.
    pub async fn run(&mut self, credentials: &Credentials, query: &AuditQuery) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::new(self.run_id.clone());

        info!(run_id = %self.run_id, sink = self.sink.name(), "Starting export run");

        if let Err(e) = self.execute(credentials, query, &mut report).await {
            error!(run_id = %self.run_id, state = %report.state, error = %e, "Export run failed");
            report.state = RunState::Failed;
            report.error = Some(e);
        }

        if let Err(e) = self.sink.close().await {
            warn!(error = %e, "Failed to close sink");
        }

        #[allow(clippy::cast_possible_truncation)]
        {
            report.stats.duration_ms = start.elapsed().as_millis() as u64;
        }
        report.finished_at = Some(Utc::now());

        let stats = &report.stats;
        info!(
            run_id = %self.run_id,
            state = %report.state,
            pages = stats.pages_fetched,
            records = stats.records_fetched,
            skipped = stats.records_skipped,
            delivered = stats.batches_delivered,
            failed = stats.batches_failed,
            bytes = stats.bytes_delivered,
            duration_ms = stats.duration_ms,
            "Export run finished"
        );

        report
    }

    async fn execute(
        &mut self,
        credentials: &Credentials,
        query: &AuditQuery,
        report: &mut RunReport,
    ) -> Result<()> {
        let mut batcher = Batcher::new(self.config.max_batch_bytes)?;

        let token = self.provider.acquire_token(credentials).await?;
        report.state = RunState::Authenticated;

        // Nothing reaches the destination for a run that never authenticated
        self.sink.open().await?;

        let soql = query.to_soql();
        debug!(query = %soql, "Querying audit trail");

        let sink = self.sink.as_mut();
        let stream = pages(self.source.as_ref(), &soql, &token);
        futures::pin_mut!(stream);

        while let Some(page) = stream.next().await {
            let page = page?;
            report.state = RunState::PageReady;
            report.stats.add_page(page.len());

            let has_more = page.has_more();
            info!(
                page = report.stats.pages_fetched,
                records = page.len(),
                has_more,
                "Fetched page"
            );

            for record in page.records {
                match batcher.feed(record) {
                    Ok(Some(batch)) => deliver(sink, &batch, &mut report.stats).await,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(page = report.stats.pages_fetched, error = %e, "Skipping record");
                        report.stats.add_skipped();
                    }
                }
            }

            // No batch spans two pages
            if let Some(batch) = batcher.flush() {
                deliver(sink, &batch, &mut report.stats).await;
            }

            if has_more
                && self.config.max_pages > 0
                && report.stats.pages_fetched >= self.config.max_pages
            {
                warn!(
                    max_pages = self.config.max_pages,
                    "Page limit reached, stopping before the next page"
                );
                report.stopped_early = true;
                break;
            }
        }

        report.state = RunState::Done;
        Ok(())
    }
}

/// Hand one batch to the sink; failures are logged and counted
async fn deliver(sink: &mut dyn Sink, batch: &Batch, stats: &mut RunStats) {
    match sink.deliver(batch).await {
        Ok(receipt) => stats.add_delivered(receipt.records, receipt.payload_bytes),
        Err(e) => {
            error!(
                sequence = batch.sequence,
                records = batch.len(),
                error = %e,
                "Batch delivery failed, dropping batch"
            );
            stats.add_failed();
        }
    }
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("sink", &self.sink.name())
            .field("config", &self.config)
            .field("run_id", &self.run_id)
            .finish()
    }
}
