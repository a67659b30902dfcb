// src/pipeline/pipeline.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Config, CountSample, CursorState, QueryDescriptor, QueryKind, Snapshot};
use crate::services::{CountSource, PagedSource};
use crate::storage::{CursorStore, ObjectCountStore, ObjectCursorStore, ObjectStore};

use super::counts::{CountTargets, DumpReport, dump_counts, record_count};
use super::diff::{DiffReport, DiffResult, diff_batches, diff_range};
use super::fetch::{FetchCycle, FetchOutcome};
use super::merge::{MergeReport, merge_batches, merge_range};

/// What a fetch invocation did, including any follow-up merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRun {
    pub outcome: FetchOutcome,
    pub merge: Option<MergeReport>,
}

/// Every entry point, bound to one configuration and its collaborators.
pub struct Pipeline {
    config: Arc<Config>,
    objects: Arc<dyn ObjectStore>,
    cursors: Arc<dyn CursorStore>,
    counts: ObjectCountStore,
    pages: Arc<dyn PagedSource>,
    counter: Arc<dyn CountSource>,
}

impl Pipeline {
    /// Wire a pipeline whose cursor and count tables live in the same
    /// object store as the batches.
    pub fn new<S>(config: Config, objects: Arc<dyn ObjectStore>, source: Arc<S>) -> Self
    where
        S: PagedSource + CountSource + 'static,
    {
        let state_namespace = config.storage.state_namespace.clone();
        let cursors = Arc::new(ObjectCursorStore::new(objects.clone(), &state_namespace));
        let counts = ObjectCountStore::new(objects.clone(), &state_namespace);
        Self {
            config: Arc::new(config),
            objects,
            cursors,
            counts,
            pages: source.clone(),
            counter: source,
        }
    }

    /// Replace the cursor store.
    pub fn with_cursor_store(mut self, cursors: Arc<dyn CursorStore>) -> Self {
        self.cursors = cursors;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn descriptor(&self, kind: &QueryKind) -> Result<QueryDescriptor> {
        self.config.descriptor(kind)
    }

    fn namespace(&self, kind: &QueryKind) -> Result<&str> {
        Ok(self.config.query(kind)?.namespace.as_str())
    }

    fn count_targets(&self) -> Result<CountTargets<'_>> {
        let query = self.config.query(&QueryKind::Following)?;
        Ok(CountTargets {
            account_id: &query.account_id,
            table: &self.config.pipeline.count_table,
            dump_namespace: &self.config.storage.counts_namespace,
            hourly_window_days: self.config.pipeline.hourly_window_days,
        })
    }

    /// Run one fetch cycle, then merge the run if it just completed.
    pub async fn fetch(&self, kind: &QueryKind) -> Result<FetchRun> {
        self.fetch_at(kind, Utc::now()).await
    }

    pub async fn fetch_at(&self, kind: &QueryKind, now: DateTime<Utc>) -> Result<FetchRun> {
        let descriptor = self.descriptor(kind)?;
        let page_delay = Duration::from_millis(self.config.source.page_delay_ms);

        let outcome = FetchCycle::new(
            self.pages.as_ref(),
            self.cursors.as_ref(),
            self.objects.as_ref(),
            page_delay,
        )
        .run_at(&descriptor, now)
        .await?;

        let merge = match outcome.cursor_id() {
            Some(id) if outcome.is_complete() && self.config.pipeline.merge_on_complete => {
                log::info!("Query run {} complete, merging", id);
                let (_, report) =
                    merge_batches(self.objects.as_ref(), &descriptor.namespace, &id.to_string())
                        .await?;
                Some(report)
            }
            _ => None,
        };

        Ok(FetchRun { outcome, merge })
    }

    pub async fn merge(&self, kind: &QueryKind, batch_id: &str) -> Result<(Snapshot, MergeReport)> {
        merge_batches(self.objects.as_ref(), self.namespace(kind)?, batch_id).await
    }

    pub async fn merge_range(&self, kind: &QueryKind, min: u64, max: u64) -> Result<Vec<MergeReport>> {
        merge_range(self.objects.as_ref(), self.namespace(kind)?, min, max).await
    }

    pub async fn diff(
        &self,
        kind: &QueryKind,
        earlier: &str,
        later: &str,
    ) -> Result<(DiffResult, DiffReport)> {
        diff_batches(self.objects.as_ref(), self.namespace(kind)?, earlier, later).await
    }

    pub async fn diff_range(&self, kind: &QueryKind, min: u64, max: u64) -> Result<Vec<DiffReport>> {
        diff_range(self.objects.as_ref(), self.namespace(kind)?, min, max).await
    }

    /// Append the current following count to the count table.
    pub async fn record_count(&self) -> Result<CountSample> {
        let targets = self.count_targets()?;
        record_count(self.counter.as_ref(), &self.counts, &targets, Utc::now()).await
    }

    /// Publish `hourly.json` and `daily.json`.
    pub async fn dump_counts(&self) -> Result<DumpReport> {
        self.dump_counts_at(Utc::now()).await
    }

    pub async fn dump_counts_at(&self, now: DateTime<Utc>) -> Result<DumpReport> {
        let targets = self.count_targets()?;
        dump_counts(&self.counts, self.objects.as_ref(), &targets, now).await
    }

    /// Cursor rows for a query, oldest first.
    pub async fn status(&self, kind: &QueryKind) -> Result<Vec<CursorState>> {
        let descriptor = self.descriptor(kind)?;
        self.cursors.list_statuses(&descriptor.cursor_table).await
    }
}
