//! Sink module
//!
//! Delivery targets for sealed batches.
//!
//! # Overview
//!
//! - `Sink` - "send one batch" trait, used as `Box<dyn Sink>`
//! - `QueueSink` - sends one SQS message per batch
//! - `FileSink` - appends each batch to a local file
//! - `SinkConfig` - picks and configures one of the above

mod file;
mod queue;

pub use file::{FileSink, FileSinkConfig};
pub use queue::{QueueOrdering, QueueSink, QueueSinkConfig, DEFAULT_GROUP_KEY};

use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::http::HttpClientConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Confirmation of one delivered batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Sequence number of the delivered batch
    pub sequence: u64,
    /// Records carried
    pub records: usize,
    /// Size of the payload that was sent or written
    pub payload_bytes: usize,
    /// Identifier assigned by the destination, if it returned one
    pub message_id: Option<String>,
}

/// Destination for batches
#[async_trait]
pub trait Sink: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Acquire the destination before the first batch
    ///
    /// Called once the run is authenticated. A failure here ends the run.
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Deliver one batch
    ///
    /// Failures come back as [`Error::Delivery`]; nothing is retried beyond
    /// the sink's own transport policy.
    async fn deliver(&mut self, batch: &Batch) -> Result<DeliveryReceipt>;

    /// Finish the run, flushing anything buffered
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct Payload<'a, T> {
    message: &'a [T],
}

/// Render the textual form of a batch: `{"message": [record, ...]}`
pub fn batch_payload<T: Serialize>(batch: &Batch<T>) -> Result<String> {
    serde_json::to_string(&Payload {
        message: &batch.records,
    })
    .map_err(|e| Error::delivery(format!("cannot encode batch {}: {e}", batch.sequence), false))
}

/// Which sink a run delivers to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// SQS queue
    Queue(QueueSinkConfig),
    /// Append-only local file
    File(FileSinkConfig),
}

impl SinkConfig {
    /// Short name of the configured sink
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queue(_) => "queue",
            Self::File(_) => "file",
        }
    }

    /// Check the sink settings
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Queue(config) => config.validate(),
            Self::File(config) => config.validate(),
        }
    }

    /// Create the configured sink
    ///
    /// Nothing is written until [`Sink::open`]. `run_id` seeds queue
    /// deduplication ids when those are enabled.
    pub async fn build(&self, http: &HttpClientConfig, run_id: &str) -> Result<Box<dyn Sink>> {
        let sink: Box<dyn Sink> = match self {
            Self::Queue(config) => {
                Box::new(QueueSink::connect(config.clone(), http).await?.with_run_id(run_id))
            }
            Self::File(config) => Box::new(FileSink::new(config.clone())?),
        };
        Ok(sink)
    }
}
