//! Batch module
//!
//! Groups records into batches bounded by serialized size.
//!
//! # Overview
//!
//! - `Batcher` - streaming accumulator fed one record at a time
//! - `Batch` - a sealed group of records with its byte size
//! - `batch_page` - convenience for batching one page in one call

mod batcher;

pub use batcher::{batch_page, Batch, Batcher, DEFAULT_MAX_BATCH_BYTES};

#[cfg(test)]
mod tests;
