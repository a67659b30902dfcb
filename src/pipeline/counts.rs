// src/pipeline/counts.rs

//! Following-count snapshots and their published dumps.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::Result;
use crate::models::{CountSample, DailyCount};
use crate::services::CountSource;
use crate::storage::{ObjectCountStore, ObjectStore, paths, write_json};

/// Where count samples live and where dumps are published.
#[derive(Debug, Clone)]
pub struct CountTargets<'a> {
    pub account_id: &'a str,
    pub table: &'a str,
    pub dump_namespace: &'a str,
    pub hourly_window_days: i64,
}

/// Sizes of the two published files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpReport {
    pub hourly: usize,
    pub daily: usize,
}

/// Ask the source for the current count and append it as a sample.
pub async fn record_count(
    source: &dyn CountSource,
    counts: &ObjectCountStore,
    targets: &CountTargets<'_>,
    now: DateTime<Utc>,
) -> Result<CountSample> {
    let count = source.following_count(targets.account_id).await?;
    log::info!("Account {} follows {} accounts", targets.account_id, count);

    let sample = CountSample {
        timestamp: now,
        count,
    };
    counts.append(targets.table, sample).await?;
    Ok(sample)
}

/// Mean count per UTC day, rounded down, in date order.
pub fn daily_means(samples: &[CountSample]) -> Vec<DailyCount> {
    let mut days: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for sample in samples {
        let (sum, n) = days.entry(sample.timestamp.date_naive()).or_default();
        *sum += sample.count;
        *n += 1;
    }

    days.into_iter()
        .map(|(date, (sum, n))| DailyCount {
            date,
            count: sum / n,
        })
        .collect()
}

/// Write `hourly.json` (raw samples inside the window) and `daily.json`
/// (daily means since the first sample).
pub async fn dump_counts(
    counts: &ObjectCountStore,
    objects: &dyn ObjectStore,
    targets: &CountTargets<'_>,
    now: DateTime<Utc>,
) -> Result<DumpReport> {
    let samples = counts.samples(targets.table).await?;

    let since = now - Duration::days(targets.hourly_window_days);
    let hourly: Vec<&CountSample> = samples.iter().filter(|s| s.timestamp >= since).collect();
    write_json(objects, targets.dump_namespace, paths::HOURLY_COUNTS_KEY, &hourly).await?;

    let daily = daily_means(&samples);
    write_json(objects, targets.dump_namespace, paths::DAILY_COUNTS_KEY, &daily).await?;

    log::info!(
        "Dumped {} hourly and {} daily counts to {}",
        hourly.len(),
        daily.len(),
        targets.dump_namespace
    );
    Ok(DumpReport {
        hourly: hourly.len(),
        daily: daily.len(),
    })
}
