//! Diff calculation between two snapshots.
//!
//! Identity is the record id only. A record present in both snapshots is
//! never reported, even if its name or username changed.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Record, Snapshot};
use crate::storage::{ObjectStore, paths, read_json, write_json};

/// Records that left and joined between two snapshots, sorted by id.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// In the later snapshot only
    pub added: Vec<Record>,
    /// In the earlier snapshot only
    pub deleted: Vec<Record>,
}

impl DiffResult {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.deleted.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.deleted.len()
    }
}

/// Compute deleted (`earlier \ later`) and added (`later \ earlier`) by id.
///
/// Both snapshots iterate in id order, so this is a single merge walk.
pub fn diff_snapshots(earlier: &Snapshot, later: &Snapshot) -> DiffResult {
    let mut result = DiffResult::default();
    let mut left = earlier.records().peekable();
    let mut right = later.records().peekable();

    loop {
        match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => match l.id.cmp(&r.id) {
                Ordering::Less => result.deleted.extend(left.next().cloned()),
                Ordering::Greater => result.added.extend(right.next().cloned()),
                Ordering::Equal => {
                    left.next();
                    right.next();
                }
            },
            (Some(_), None) => result.deleted.extend(left.next().cloned()),
            (None, Some(_)) => result.added.extend(right.next().cloned()),
            (None, None) => break,
        }
    }

    result
}

/// Summary of a persisted diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub earlier: String,
    pub later: String,
    pub added: usize,
    pub deleted: usize,
    pub added_key: String,
    pub deleted_key: String,
}

/// Read `{batch_id}-merged`.
pub async fn load_snapshot(
    objects: &dyn ObjectStore,
    namespace: &str,
    batch_id: &str,
) -> Result<Snapshot> {
    let key = paths::merged_key(batch_id);
    let records: Vec<Record> = read_json(objects, namespace, &key)
        .await
        .inspect_err(|e| log::error!("Failed to load snapshot {}/{}: {}", namespace, key, e))?;
    Ok(Snapshot::from_records(batch_id, records))
}

/// Diff two persisted snapshots and write both outputs.
///
/// Nothing is written unless both snapshots load.
pub async fn diff_batches(
    objects: &dyn ObjectStore,
    namespace: &str,
    earlier: &str,
    later: &str,
) -> Result<(DiffResult, DiffReport)> {
    let before = load_snapshot(objects, namespace, earlier).await?;
    let after = load_snapshot(objects, namespace, later).await?;
    let diff = diff_snapshots(&before, &after);

    let deleted_key = paths::deleted_key(earlier, later);
    let added_key = paths::added_key(earlier, later);
    write_json(objects, namespace, &deleted_key, &diff.deleted).await?;
    write_json(objects, namespace, &added_key, &diff.added).await?;

    log::info!(
        "Diff {} -> {}: {} added, {} deleted",
        earlier,
        later,
        diff.added.len(),
        diff.deleted.len()
    );

    let report = DiffReport {
        earlier: earlier.to_string(),
        later: later.to_string(),
        added: diff.added.len(),
        deleted: diff.deleted.len(),
        added_key,
        deleted_key,
    };
    Ok((diff, report))
}

/// Diff each consecutive pair `(i, i + 1)` for `min <= i < max`.
pub async fn diff_range(
    objects: &dyn ObjectStore,
    namespace: &str,
    min: u64,
    max: u64,
) -> Result<Vec<DiffReport>> {
    if min >= max {
        return Err(AppError::validation(format!(
            "diff range needs at least two ids: {min}..={max}"
        )));
    }

    let mut reports = Vec::new();
    for id in min..max {
        let (_, report) =
            diff_batches(objects, namespace, &id.to_string(), &(id + 1).to_string()).await?;
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    const NS: &str = "verified-accounts";

    fn snapshot(records: &[(&str, &str, &str)]) -> Snapshot {
        Snapshot::from_records(
            "s",
            records
                .iter()
                .map(|(id, name, username)| Record::new(*id, *name, *username))
                .collect(),
        )
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_added_and_deleted() {
        let a = snapshot(&[("1", "Elion", "elion"), ("2", "Scarramooch", "scara")]);
        let b = snapshot(&[("1", "Elion", "elion"), ("3", "Tarump", "tarump")]);

        let result = diff_snapshots(&a, &b);
        assert_eq!(result.deleted, vec![Record::new("2", "Scarramooch", "scara")]);
        assert_eq!(result.added, vec![Record::new("3", "Tarump", "tarump")]);
        assert_eq!(result.change_count(), 2);
    }

    #[test]
    fn test_no_changes() {
        let a = snapshot(&[("1", "A", "a"), ("2", "B", "b")]);
        let result = diff_snapshots(&a, &a.clone());
        assert!(!result.has_changes());
    }

    #[test]
    fn test_swapping_inputs_swaps_outputs() {
        let a = snapshot(&[("1", "A", "a"), ("2", "B", "b"), ("4", "D", "d")]);
        let b = snapshot(&[("2", "B", "b"), ("3", "C", "c"), ("5", "E", "e")]);

        let forward = diff_snapshots(&a, &b);
        let backward = diff_snapshots(&b, &a);
        assert_eq!(forward.added, backward.deleted);
        assert_eq!(forward.deleted, backward.added);
        assert_eq!(ids(&forward.deleted), vec!["1", "4"]);
        assert_eq!(ids(&forward.added), vec!["3", "5"]);
    }

    #[test]
    fn test_field_change_is_not_reported() {
        let a = snapshot(&[("1", "Old Name", "old")]);
        let b = snapshot(&[("1", "New Name", "new")]);
        assert!(!diff_snapshots(&a, &b).has_changes());
    }

    #[test]
    fn test_empty_to_full() {
        let empty = snapshot(&[]);
        let full = snapshot(&[("1", "A", "a")]);

        let result = diff_snapshots(&empty, &full);
        assert_eq!(ids(&result.added), vec!["1"]);
        assert!(result.deleted.is_empty());
    }

    async fn put_snapshot(storage: &MemoryStorage, batch_id: &str, records: &[(&str, &str, &str)]) {
        let bytes = snapshot(records).to_bytes().unwrap();
        storage
            .put_object(NS, &paths::merged_key(batch_id), bytes)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_diff_batches_writes_outputs() {
        let storage = MemoryStorage::new();
        put_snapshot(&storage, "1", &[("1", "Elion", "elion"), ("2", "Scarramooch", "scara")]).await;
        put_snapshot(&storage, "2", &[("1", "Elion", "elion"), ("3", "Tarump", "tarump")]).await;

        let (_, report) = diff_batches(&storage, NS, "1", "2").await.unwrap();
        assert_eq!(report.added_key, "1_2-added");
        assert_eq!(report.deleted_key, "1_2-deleted");

        let added = storage.get_object(NS, "1_2-added").await.unwrap();
        assert_eq!(
            String::from_utf8(added).unwrap(),
            r#"[{"id":"3","name":"Tarump","username":"tarump"}]"#
        );
        let deleted: Vec<Record> = read_json(&storage, NS, "1_2-deleted").await.unwrap();
        assert_eq!(ids(&deleted), vec!["2"]);
    }

    #[tokio::test]
    async fn test_missing_snapshot_writes_nothing() {
        let storage = MemoryStorage::new();
        put_snapshot(&storage, "1", &[("1", "A", "a")]).await;

        let err = diff_batches(&storage, NS, "1", "2").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(storage.len(NS), 1);
    }

    #[tokio::test]
    async fn test_diff_range_walks_consecutive_pairs() {
        let storage = MemoryStorage::new();
        put_snapshot(&storage, "4", &[("1", "A", "a")]).await;
        put_snapshot(&storage, "5", &[("1", "A", "a"), ("2", "B", "b")]).await;
        put_snapshot(&storage, "6", &[("2", "B", "b")]).await;

        let reports = diff_range(&storage, NS, 4, 6).await.unwrap();
        let keys: Vec<&str> = reports.iter().map(|r| r.added_key.as_str()).collect();
        assert_eq!(keys, vec!["4_5-added", "5_6-added"]);
        assert_eq!((reports[0].added, reports[0].deleted), (1, 0));
        assert_eq!((reports[1].added, reports[1].deleted), (0, 1));

        assert!(diff_range(&storage, NS, 6, 6).await.is_err());
    }

    #[tokio::test]
    async fn test_diff_range_huge_span_stops_at_first_missing() {
        let storage = MemoryStorage::new();
        let err = diff_range(&storage, NS, 0, u64::MAX).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(storage.is_empty(NS));
    }
}
