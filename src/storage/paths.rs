//! Object key naming.
//!
//! These formats are read by downstream consumers and must not change.

pub const MERGED_SUFFIX: &str = "merged";
pub const ADDED_SUFFIX: &str = "added";
pub const DELETED_SUFFIX: &str = "deleted";

pub const HOURLY_COUNTS_KEY: &str = "hourly.json";
pub const DAILY_COUNTS_KEY: &str = "daily.json";

/// `{cursorId}-{invocationTimestampMs}`
pub fn batch_key(batch_id: &str, sequence_tag: i64) -> String {
    format!("{batch_id}-{sequence_tag}")
}

/// Listing prefix shared by every object of one query run.
pub fn batch_prefix(batch_id: &str) -> String {
    format!("{batch_id}-")
}

/// `{batchId}-merged`
pub fn merged_key(batch_id: &str) -> String {
    format!("{batch_id}-{MERGED_SUFFIX}")
}

/// `{id1}_{id2}-added`
pub fn added_key(earlier: &str, later: &str) -> String {
    format!("{earlier}_{later}-{ADDED_SUFFIX}")
}

/// `{id1}_{id2}-deleted`
pub fn deleted_key(earlier: &str, later: &str) -> String {
    format!("{earlier}_{later}-{DELETED_SUFFIX}")
}

/// Sequence tag of a raw batch key, or `None` for any other object
/// under the same prefix (such as the merged snapshot).
pub fn parse_batch_key(batch_id: &str, key: &str) -> Option<i64> {
    let tag = key.strip_prefix(&batch_prefix(batch_id))?;
    if tag.is_empty() || !tag.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tag.parse().ok()
}
