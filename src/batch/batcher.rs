//! Size-bounded batcher
//!
//! Records are measured by their compact JSON encoding. A batch is sealed
//! once its running size reaches the ceiling, or earlier when the next
//! record would push it past the ceiling. A record that is bigger than the
//! ceiling on its own still travels, alone in its batch.
//!
//! Sealing before an overflow means batch boundaries inside a page can
//! differ from a plain "append, then seal once the ceiling is reached"
//! rule: with a 600 byte ceiling, records of 500, 300 and 200 bytes become
//! batches of 500 and 500 bytes rather than 800 and 200.

use crate::error::{Error, Result};
use crate::types::Record;
use serde::Serialize;
use tracing::{debug, warn};

/// Default batch ceiling in bytes
pub const DEFAULT_MAX_BATCH_BYTES: usize = 200_000;

/// A sealed group of records
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T = Record> {
    /// Records in arrival order
    pub records: Vec<T>,
    /// Sum of the compact JSON sizes of the records
    pub serialized_bytes: usize,
    /// Position of this batch in the run, starting at 0
    pub sequence: u64,
}

impl<T> Batch<T> {
    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no records (never true for sealed batches)
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Accumulates records into size-bounded batches
#[derive(Debug)]
pub struct Batcher<T = Record> {
    max_bytes: usize,
    pending: Vec<T>,
    pending_bytes: usize,
    next_sequence: u64,
}

impl<T: Serialize> Default for Batcher<T> {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BATCH_BYTES,
            pending: Vec::new(),
            pending_bytes: 0,
            next_sequence: 0,
        }
    }
}

impl<T: Serialize> Batcher<T> {
    /// Create a batcher with the given ceiling
    pub fn new(max_bytes: usize) -> Result<Self> {
        if max_bytes == 0 {
            return Err(Error::invalid_value(
                "max_batch_bytes",
                "must be greater than 0",
            ));
        }
        Ok(Self {
            max_bytes,
            ..Self::default()
        })
    }

    /// Batch ceiling in bytes
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Records waiting in the accumulator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Bytes waiting in the accumulator
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Measure a record
    pub fn record_size(record: &T) -> Result<usize> {
        serde_json::to_vec(record)
            .map(|bytes| bytes.len())
            .map_err(|e| Error::serialization(e.to_string()))
    }

    /// Add a record, returning a batch if one was sealed
    ///
    /// On a serialization error the record is dropped and the accumulator
    /// is left as it was.
    pub fn feed(&mut self, record: T) -> Result<Option<Batch<T>>> {
        let size = Self::record_size(&record)?;

        let mut sealed = None;
        if !self.pending.is_empty() && self.pending_bytes + size > self.max_bytes {
            sealed = self.seal();
        }

        self.pending.push(record);
        self.pending_bytes += size;

        // At most one batch leaves per call. An oversized record that
        // arrived right after a seal waits for the next feed or flush.
        if sealed.is_none() && self.pending_bytes >= self.max_bytes {
            sealed = self.seal();
        }

        Ok(sealed)
    }

    /// Seal whatever is pending
    pub fn flush(&mut self) -> Option<Batch<T>> {
        self.seal()
    }

    fn seal(&mut self) -> Option<Batch<T>> {
        if self.pending.is_empty() {
            return None;
        }

        let batch = Batch {
            records: std::mem::take(&mut self.pending),
            serialized_bytes: std::mem::replace(&mut self.pending_bytes, 0),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        debug!(
            sequence = batch.sequence,
            records = batch.len(),
            bytes = batch.serialized_bytes,
            "Sealed batch"
        );
        Some(batch)
    }
}

/// Batch a single page of records
///
/// Records that cannot be serialized are logged and skipped. The page's
/// trailing partial batch is always included.
pub fn batch_page<T: Serialize>(
    records: impl IntoIterator<Item = T>,
    max_bytes: usize,
) -> Result<Vec<Batch<T>>> {
    let mut batcher = Batcher::new(max_bytes)?;
    let mut batches = Vec::new();

    for (index, record) in records.into_iter().enumerate() {
        match batcher.feed(record) {
            Ok(Some(batch)) => batches.push(batch),
            Ok(None) => {}
            Err(e) => warn!(index, error = %e, "Skipping record"),
        }
    }
    batches.extend(batcher.flush());

    Ok(batches)
}
