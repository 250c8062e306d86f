//! File sink
//!
//! Appends each batch's `{"message": [...]}` text to a local file. The file
//! is created when missing and never truncated, and not touched before
//! [`Sink::open`]. There is no locking; one writer per file is assumed.

use super::{batch_payload, DeliveryReceipt, Sink};
use crate::batch::Batch;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// File sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSinkConfig {
    /// Output file
    pub path: PathBuf,
    /// Written after every batch. Unset means batches are concatenated.
    #[serde(default)]
    pub separator: Option<String>,
}

impl FileSinkConfig {
    /// Settings for the given path, without separator
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            separator: None,
        }
    }

    /// Write `separator` after every batch
    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Check the settings
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::missing_field("sink.path"));
        }
        Ok(())
    }
}

/// Appends batches to a file
#[derive(Debug)]
pub struct FileSink {
    config: FileSinkConfig,
    file: Option<File>,
}

impl FileSink {
    /// Create the sink; the file is opened by [`Sink::open`]
    pub fn new(config: FileSinkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, file: None })
    }

    async fn handle(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.config.path)
                .await
                .map_err(|e| {
                    Error::config(format!("cannot open {}: {e}", self.config.path.display()))
                })?;
            debug!(path = %self.config.path.display(), "Opened output file");
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| Error::config("output file not open"))
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let file = self.handle().await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn open(&mut self) -> Result<()> {
        self.handle().await?;
        Ok(())
    }

    async fn deliver(&mut self, batch: &Batch) -> Result<DeliveryReceipt> {
        let mut payload = batch_payload(batch)?;
        if let Some(separator) = &self.config.separator {
            payload.push_str(separator);
        }

        self.write(payload.as_bytes())
            .await
            .map_err(Error::into_delivery)?;

        info!(
            sequence = batch.sequence,
            records = batch.len(),
            path = %self.config.path.display(),
            "Batch written"
        );

        Ok(DeliveryReceipt {
            sequence: batch.sequence,
            records: batch.len(),
            payload_bytes: payload.len(),
            message_id: None,
        })
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}
