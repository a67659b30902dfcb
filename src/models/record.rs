//! Records, raw batches, and merged snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::storage::paths;

/// A followed account as returned by the source.
///
/// Only `id` takes part in merge and diff comparisons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Record {
    /// Source-assigned account id
    pub id: String,

    /// Display name
    pub name: String,

    /// Handle
    pub username: String,
}

impl Record {
    pub fn new(id: impl Into<String>, name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            username: username.into(),
        }
    }
}

/// One persisted fetch cycle worth of records.
///
/// Stored verbatim under `{batch_id}-{sequence_tag}`; never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBatch {
    /// Cursor id of the query run this batch belongs to
    pub batch_id: String,

    /// Invocation timestamp in milliseconds
    pub sequence_tag: i64,

    /// Records in page order
    pub items: Vec<Record>,
}

impl RawBatch {
    pub fn new(batch_id: impl Into<String>, sequence_tag: i64, items: Vec<Record>) -> Self {
        Self {
            batch_id: batch_id.into(),
            sequence_tag,
            items,
        }
    }

    /// Object key of this batch.
    pub fn key(&self) -> String {
        paths::batch_key(&self.batch_id, self.sequence_tag)
    }
}

/// Deduplicated consolidation of every batch of one query run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub batch_id: String,
    items: BTreeMap<String, Record>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            items: BTreeMap::new(),
        }
    }

    /// Build a snapshot from a flat record list; later duplicates win.
    pub fn from_records(batch_id: impl Into<String>, records: Vec<Record>) -> Self {
        let mut snapshot = Self::new(batch_id);
        snapshot.extend(records);
        snapshot
    }

    /// Fold batches in the order given; a record from a later batch replaces
    /// any earlier record with the same id.
    pub fn fold(batch_id: impl Into<String>, batches: impl IntoIterator<Item = RawBatch>) -> Self {
        let mut snapshot = Self::new(batch_id);
        for batch in batches {
            snapshot.extend(batch.items);
        }
        snapshot
    }

    /// Insert a record, returning the one it replaced.
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        self.items.insert(record.id.clone(), record)
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.insert(record);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records in ascending id order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.items.values()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.items.into_values().collect()
    }

    /// Persisted form: a compact JSON array ordered by id.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let records: Vec<&Record> = self.records().collect();
        Ok(serde_json::to_vec(&records)?)
    }
}

/// Hex SHA-256 of persisted bytes.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_last_write_wins() {
        let first = RawBatch::new("7", 1_000, vec![Record::new("42", "Old", "old")]);
        let second = RawBatch::new(
            "7",
            2_000,
            vec![Record::new("42", "New", "new"), Record::new("43", "Other", "other")],
        );

        let snapshot = Snapshot::fold("7", vec![first, second]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("42").map(|r| r.name.as_str()), Some("New"));
    }

    #[test]
    fn test_duplicates_within_batch_collapse() {
        let snapshot = Snapshot::from_records(
            "1",
            vec![
                Record::new("1", "A", "a"),
                Record::new("1", "B", "b"),
            ],
        );
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("1").map(|r| r.username.as_str()), Some("b"));
    }

    #[test]
    fn test_bytes_are_sorted_and_compact() {
        let snapshot = Snapshot::from_records(
            "1",
            vec![Record::new("2", "B", "b"), Record::new("1", "A", "a")],
        );
        let json = String::from_utf8(snapshot.to_bytes().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"[{"id":"1","name":"A","username":"a"},{"id":"2","name":"B","username":"b"}]"#
        );
    }

    #[test]
    fn test_record_ignores_extra_fields() {
        let json = r#"{"id":"9","name":"Nine","username":"nine","verified":true}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record, Record::new("9", "Nine", "nine"));
    }

    #[test]
    fn test_batch_key() {
        let batch = RawBatch::new("12", 1_700_000_000_123, Vec::new());
        assert_eq!(batch.key(), "12-1700000000123");
    }

    #[test]
    fn test_digest_is_stable() {
        let a = content_digest(b"[]");
        let b = content_digest(b"[]");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
