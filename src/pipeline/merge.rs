// src/pipeline/merge.rs

//! Merge engine: fold every raw batch of one query run into a snapshot.

use futures::{StreamExt, TryStreamExt, stream};

use crate::error::{AppError, Result};
use crate::models::{RawBatch, Record, Snapshot, content_digest};
use crate::storage::{ObjectStore, paths, read_json};

/// Summary of a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub batch_id: String,
    /// Raw batches folded
    pub batch_count: usize,
    /// Distinct ids in the snapshot
    pub record_count: usize,
    /// Key the snapshot was written to
    pub key: String,
    /// Hex SHA-256 of the written bytes
    pub digest: String,
}

/// Load every raw batch of `batch_id` in fold order.
///
/// Batches are ordered by their numeric sequence tag (ties broken by key),
/// so the result does not depend on how a backend orders its listing.
/// Other objects under the prefix, such as the merged snapshot, are skipped.
pub async fn load_batches(
    objects: &dyn ObjectStore,
    namespace: &str,
    batch_id: &str,
) -> Result<Vec<RawBatch>> {
    let keys = objects
        .list_keys(namespace, &paths::batch_prefix(batch_id))
        .await?;

    let mut tagged: Vec<(i64, String)> = keys
        .into_iter()
        .filter_map(|key| paths::parse_batch_key(batch_id, &key).map(|tag| (tag, key)))
        .collect();
    tagged.sort();

    stream::iter(tagged)
        .then(|(tag, key)| async move {
            let items: Vec<Record> = read_json(objects, namespace, &key)
                .await
                .inspect_err(|e| log::error!("Failed to read batch {}/{}: {}", namespace, key, e))?;
            Ok::<_, AppError>(RawBatch::new(batch_id, tag, items))
        })
        .try_collect()
        .await
}

/// Merge all raw batches of one run and write `{batch_id}-merged`.
///
/// On an id collision the record from the batch with the higher sequence
/// tag wins; within a batch the later record wins. Re-running over the same
/// batches writes identical bytes.
pub async fn merge_batches(
    objects: &dyn ObjectStore,
    namespace: &str,
    batch_id: &str,
) -> Result<(Snapshot, MergeReport)> {
    let batches = load_batches(objects, namespace, batch_id).await?;
    if batches.is_empty() {
        log::warn!("No raw batches found for {} in {}", batch_id, namespace);
        return Err(AppError::not_found(
            namespace,
            paths::batch_prefix(batch_id),
        ));
    }

    let batch_count = batches.len();
    let raw_records: usize = batches.iter().map(|b| b.items.len()).sum();
    let snapshot = Snapshot::fold(batch_id, batches);

    let bytes = snapshot.to_bytes()?;
    let digest = content_digest(&bytes);
    let key = paths::merged_key(batch_id);
    objects
        .put_object(namespace, &key, bytes)
        .await
        .inspect_err(|e| log::error!("Failed to write snapshot {}: {}", key, e))?;

    log::info!(
        "Merged {} batches ({} records, {} unique) into {}/{}",
        batch_count,
        raw_records,
        snapshot.len(),
        namespace,
        key
    );

    let report = MergeReport {
        batch_id: batch_id.to_string(),
        batch_count,
        record_count: snapshot.len(),
        key,
        digest,
    };
    Ok((snapshot, report))
}

/// Merge every id in `min..=max`; ids without batches are skipped.
pub async fn merge_range(
    objects: &dyn ObjectStore,
    namespace: &str,
    min: u64,
    max: u64,
) -> Result<Vec<MergeReport>> {
    if min > max {
        return Err(AppError::validation(format!(
            "merge range is empty: {min} > {max}"
        )));
    }

    let mut reports = Vec::new();
    for id in min..=max {
        match merge_batches(objects, namespace, &id.to_string()).await {
            Ok((_, report)) => reports.push(report),
            Err(e) if e.is_not_found() => {
                log::warn!("Skipping batch {}: nothing to merge", id);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, write_json};

    const NS: &str = "verified-accounts";

    async fn put_batch(storage: &MemoryStorage, batch_id: &str, tag: i64, records: &[Record]) {
        write_json(storage, NS, &paths::batch_key(batch_id, tag), records)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_later_batch_wins_on_collision() {
        let storage = MemoryStorage::new();
        // Written out of order; the numeric tag decides.
        put_batch(&storage, "3", 2_000, &[Record::new("42", "Second", "s")]).await;
        put_batch(&storage, "3", 1_000, &[Record::new("42", "First", "f"), Record::new("7", "Seven", "seven")]).await;

        let (snapshot, report) = merge_batches(&storage, NS, "3").await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("42").map(|r| r.name.as_str()), Some("Second"));
        assert_eq!(report.batch_count, 2);
        assert_eq!(report.record_count, 2);
        assert_eq!(report.key, "3-merged");
    }

    #[tokio::test]
    async fn test_numeric_tag_order_beats_lexicographic() {
        let storage = MemoryStorage::new();
        // "3-999" sorts after "3-1000" as text.
        put_batch(&storage, "3", 999, &[Record::new("1", "Old", "old")]).await;
        put_batch(&storage, "3", 1_000, &[Record::new("1", "New", "new")]).await;

        let (snapshot, _) = merge_batches(&storage, NS, "3").await.unwrap();
        assert_eq!(snapshot.get("1").map(|r| r.name.as_str()), Some("New"));
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let storage = MemoryStorage::new();
        put_batch(&storage, "5", 1, &[Record::new("2", "B", "b"), Record::new("1", "A", "a")]).await;
        put_batch(&storage, "5", 2, &[Record::new("3", "C", "c")]).await;

        let (_, first) = merge_batches(&storage, NS, "5").await.unwrap();
        let first_bytes = storage.get_object(NS, "5-merged").await.unwrap();
        let (_, second) = merge_batches(&storage, NS, "5").await.unwrap();
        let second_bytes = storage.get_object(NS, "5-merged").await.unwrap();

        assert_eq!(first_bytes, second_bytes);
        assert_eq!(first.digest, second.digest);
        // The snapshot itself is not folded back in.
        assert_eq!(second.batch_count, 2);
    }

    #[tokio::test]
    async fn test_ignores_other_runs_sharing_a_prefix() {
        let storage = MemoryStorage::new();
        put_batch(&storage, "1", 10, &[Record::new("1", "A", "a")]).await;
        put_batch(&storage, "11", 10, &[Record::new("2", "B", "b")]).await;

        let (snapshot, _) = merge_batches(&storage, NS, "1").await.unwrap();
        assert!(snapshot.contains("1"));
        assert!(!snapshot.contains("2"));
    }

    #[tokio::test]
    async fn test_no_batches_is_not_found() {
        let storage = MemoryStorage::new();
        let err = merge_batches(&storage, NS, "9").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(storage.is_empty(NS));
    }

    #[tokio::test]
    async fn test_malformed_batch_fails() {
        let storage = MemoryStorage::new();
        storage
            .put_object(NS, "4-100", b"not json".to_vec())
            .await
            .unwrap();

        let err = merge_batches(&storage, NS, "4").await.unwrap_err();
        assert!(matches!(err, AppError::Json(_)));
        assert!(storage.get_object_optional(NS, "4-merged").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_range_skips_missing_ids() {
        let storage = MemoryStorage::new();
        put_batch(&storage, "1", 1, &[Record::new("1", "A", "a")]).await;
        put_batch(&storage, "3", 1, &[Record::new("1", "A", "a")]).await;

        let reports = merge_range(&storage, NS, 1, 3).await.unwrap();
        let ids: Vec<&str> = reports.iter().map(|r| r.batch_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        assert!(merge_range(&storage, NS, 3, 1).await.is_err());
    }
}
