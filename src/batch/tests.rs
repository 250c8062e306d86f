//! Tests for batch module

use super::*;
use crate::error::Error;
use pretty_assertions::assert_eq;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// A JSON string whose compact encoding is exactly `size` bytes
fn sized(size: usize) -> Value {
    assert!(size >= 2);
    json!("x".repeat(size - 2))
}

fn sizes<T>(batches: &[Batch<T>]) -> Vec<usize> {
    batches.iter().map(|b| b.serialized_bytes).collect()
}

/// Serializes like its payload, or fails
#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Good(Value),
    Broken,
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Good(value) => value.serialize(serializer),
            Self::Broken => Err(serde::ser::Error::custom("unrepresentable entry")),
        }
    }
}

// ============================================================================
// Batcher Tests
// ============================================================================

#[test]
fn test_default_ceiling() {
    let batcher: Batcher = Batcher::default();
    assert_eq!(batcher.max_bytes(), DEFAULT_MAX_BATCH_BYTES);
    assert_eq!(DEFAULT_MAX_BATCH_BYTES, 200_000);
}

#[test]
fn test_zero_ceiling_rejected() {
    let err = Batcher::<Value>::new(0).unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { .. }));
}

#[test]
fn test_record_size_is_compact_json() {
    let record = json!({"Id": "0Ym1", "Section": "Manage Users"});
    assert_eq!(
        Batcher::record_size(&record).unwrap(),
        r#"{"Id":"0Ym1","Section":"Manage Users"}"#.len()
    );
}

#[test]
fn test_seals_when_ceiling_reached() {
    let mut batcher = Batcher::new(100).unwrap();

    assert!(batcher.feed(sized(40)).unwrap().is_none());
    assert!(batcher.feed(sized(40)).unwrap().is_none());
    let batch = batcher.feed(sized(20)).unwrap().expect("ceiling reached");

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.serialized_bytes, 100);
    assert_eq!(batch.sequence, 0);
    assert_eq!(batcher.pending_len(), 0);
    assert!(batcher.flush().is_none());
}

#[test]
fn test_seals_before_overflow() {
    let mut batcher = Batcher::new(100).unwrap();

    assert!(batcher.feed(sized(60)).unwrap().is_none());
    let batch = batcher.feed(sized(60)).unwrap().expect("would overflow");

    assert_eq!(batch.serialized_bytes, 60);
    assert_eq!(batcher.pending_len(), 1);
    assert_eq!(batcher.pending_bytes(), 60);

    let rest = batcher.flush().unwrap();
    assert_eq!(rest.serialized_bytes, 60);
    assert_eq!(rest.sequence, 1);
}

#[test]
fn test_boundaries_differ_from_append_then_check() {
    let mut batcher = Batcher::new(600).unwrap();

    assert!(batcher.feed(sized(500)).unwrap().is_none());
    // Appending first would give an 800 byte batch here
    let first = batcher.feed(sized(300)).unwrap().expect("would overflow");
    assert!(batcher.feed(sized(200)).unwrap().is_none());
    let second = batcher.flush().unwrap();

    assert_eq!(sizes(&[first, second]), vec![500, 500]);
}

#[test]
fn test_oversized_record_travels_alone() {
    let mut batcher = Batcher::new(100).unwrap();

    let batch = batcher.feed(sized(250)).unwrap().expect("oversized record");
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.serialized_bytes, 250);
    assert!(batcher.flush().is_none());
}

#[test]
fn test_oversized_record_after_pending() {
    let mut batcher = Batcher::new(100).unwrap();

    assert!(batcher.feed(sized(30)).unwrap().is_none());
    let first = batcher.feed(sized(250)).unwrap().unwrap();
    assert_eq!(sizes(&[first]), vec![30]);

    // The oversized record is sealed by the next feed, never merged
    let second = batcher.feed(sized(10)).unwrap().unwrap();
    assert_eq!(second.serialized_bytes, 250);
    assert_eq!(second.len(), 1);

    let third = batcher.flush().unwrap();
    assert_eq!(third.serialized_bytes, 10);
    assert_eq!(
        [second.sequence, third.sequence],
        [1, 2],
        "sequence numbers increase per sealed batch"
    );
}

#[test]
fn test_serialization_failure_leaves_accumulator() {
    let mut batcher = Batcher::new(100).unwrap();

    batcher.feed(Entry::Good(sized(30))).unwrap();
    let err = batcher.feed(Entry::Broken).unwrap_err();

    assert!(matches!(err, Error::Serialization { .. }));
    assert!(!err.is_fatal());
    assert_eq!(batcher.pending_len(), 1);
    assert_eq!(batcher.pending_bytes(), 30);
}

#[test]
fn test_flush_empty_is_none() {
    let mut batcher: Batcher = Batcher::new(10).unwrap();
    assert!(batcher.flush().is_none());
}

// ============================================================================
// batch_page Tests
// ============================================================================

#[test]
fn test_batch_page_respects_ceiling() {
    let max = 1_000;
    // Deterministic spread of record sizes, a few of them oversized
    let records: Vec<Value> = (0..500u64)
        .map(|i| sized(2 + ((i * 7919) % 1_200) as usize))
        .collect();

    let batches = batch_page(records.clone(), max).unwrap();

    for batch in &batches {
        assert!(!batch.is_empty());
        assert!(
            batch.serialized_bytes <= max || batch.len() == 1,
            "batch {} holds {} records over the ceiling",
            batch.sequence,
            batch.len()
        );
    }

    let flattened: Vec<Value> = batches.into_iter().flat_map(|b| b.records).collect();
    assert_eq!(flattened, records);
}

#[test]
fn test_batch_page_preserves_order() {
    let records: Vec<Value> = (0..50).map(|i| json!({ "Id": i })).collect();
    let batches = batch_page(records.clone(), 64).unwrap();

    assert!(batches.len() > 1);
    let sequences: Vec<u64> = batches.iter().map(|b| b.sequence).collect();
    assert_eq!(sequences, (0..batches.len() as u64).collect::<Vec<_>>());

    let flattened: Vec<Value> = batches.into_iter().flat_map(|b| b.records).collect();
    assert_eq!(flattened, records);
}

#[test]
fn test_batch_page_flushes_tail() {
    let batches = batch_page(vec![sized(10), sized(10), sized(10)], 1_000).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].serialized_bytes, 30);
}

#[test]
fn test_batch_page_empty() {
    let batches = batch_page(Vec::<Value>::new(), 100).unwrap();
    assert!(batches.is_empty());
}

#[test]
fn test_pages_do_not_share_batches() {
    // 500 bytes then 300 bytes with a 600 byte ceiling
    let first = batch_page(vec![sized(250), sized(250)], 600).unwrap();
    let second = batch_page(vec![sized(300)], 600).unwrap();

    assert_eq!(sizes(&first), vec![500]);
    assert_eq!(sizes(&second), vec![300]);
}

#[test]
fn test_batch_page_skips_broken_records() {
    let records = vec![
        Entry::Good(json!(1)),
        Entry::Broken,
        Entry::Good(json!(2)),
        Entry::Broken,
    ];

    let batches = batch_page(records, 100).unwrap();

    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0].records,
        vec![Entry::Good(json!(1)), Entry::Good(json!(2))]
    );
    assert_eq!(batches[0].serialized_bytes, 2);
}

#[test]
fn test_batch_page_rejects_zero_ceiling() {
    assert!(batch_page(vec![json!(1)], 0).is_err());
}
