// src/pipeline/fetch.rs

//! One resumable fetch cycle.
//!
//! A cycle loads the latest cursor row, pages the source from its token, then
//! writes the fetched records as a raw batch before advancing the cursor.
//! Rate limiting mid-cycle keeps whatever was fetched; a cycle that fetched
//! nothing leaves every store untouched.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{QueryDescriptor, RawBatch, ResumePoint};
use crate::services::{Interruption, PagedSource, Paginator};
use crate::storage::cursor::update_existing;
use crate::storage::{CursorStore, ObjectStore, write_json};

/// Result of a cycle that persisted at least one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Cursor row (and batch id) of the run this cycle advanced
    pub cursor_id: u64,
    /// Whether this cycle opened a new run
    pub started_run: bool,
    /// Records fetched by this cycle
    pub fetched: usize,
    /// Running total for the run
    pub total_fetched: u64,
    pub pages: u32,
    /// Token stored for the next cycle; empty once complete
    pub next_token: String,
    /// Key of the raw batch written
    pub batch_key: String,
    /// The run has no more pages; callers may merge it now
    pub complete: bool,
    pub interruption: Option<Interruption>,
}

/// Outcome of one fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Records were persisted and the cursor advanced.
    Advanced(CycleReport),
    /// Nothing fetched; no batch written and no cursor touched.
    NoProgress { interruption: Option<Interruption> },
}

impl FetchOutcome {
    pub fn cursor_id(&self) -> Option<u64> {
        match self {
            FetchOutcome::Advanced(report) => Some(report.cursor_id),
            FetchOutcome::NoProgress { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, FetchOutcome::Advanced(report) if report.complete)
    }

    pub fn fetched(&self) -> usize {
        match self {
            FetchOutcome::Advanced(report) => report.fetched,
            FetchOutcome::NoProgress { .. } => 0,
        }
    }
}

/// Pagination driver bound to its collaborators.
pub struct FetchCycle<'a> {
    source: &'a dyn PagedSource,
    cursors: &'a dyn CursorStore,
    objects: &'a dyn ObjectStore,
    page_delay: Duration,
}

impl<'a> FetchCycle<'a> {
    pub fn new(
        source: &'a dyn PagedSource,
        cursors: &'a dyn CursorStore,
        objects: &'a dyn ObjectStore,
        page_delay: Duration,
    ) -> Self {
        Self {
            source,
            cursors,
            objects,
            page_delay,
        }
    }

    /// Run one cycle stamped with the current time.
    pub async fn run(&self, descriptor: &QueryDescriptor) -> Result<FetchOutcome> {
        self.run_at(descriptor, Utc::now()).await
    }

    /// Run one cycle; `now` supplies the batch sequence tag.
    pub async fn run_at(
        &self,
        descriptor: &QueryDescriptor,
        now: DateTime<Utc>,
    ) -> Result<FetchOutcome> {
        let table = descriptor.cursor_table.as_str();
        let latest = self.cursors.latest_status(table).await?;
        let resume = ResumePoint::from_latest(latest.as_ref());

        log::info!(
            "Query {} ({}): latest status {:?}, new query: {}",
            descriptor.kind,
            table,
            latest,
            resume.is_fresh()
        );

        let run = Paginator::new(self.source, self.page_delay)
            .run(descriptor, resume.token())
            .await;

        if run.records.is_empty() {
            log::warn!(
                "No results for {} after {} pages; likely rate limiting or an intermittent error. \
                 Leaving cursor state untouched",
                table,
                run.pages
            );
            return Ok(FetchOutcome::NoProgress {
                interruption: run.interruption,
            });
        }

        // A new run needs its id before the batch key exists. The row starts
        // out empty (reads as a finished run) and only advances after the
        // batch write succeeds.
        let cursor_id = match &resume {
            ResumePoint::Fresh => self.cursors.insert_status(table, 0, "").await?,
            ResumePoint::Resume { id, .. } => *id,
        };

        let fetched = run.records.len();
        let total_fetched = resume.total_fetched() + fetched as u64;
        let batch = RawBatch::new(cursor_id.to_string(), now.timestamp_millis(), run.records);
        let batch_key = batch.key();

        write_json(self.objects, &descriptor.namespace, &batch_key, &batch.items)
            .await
            .inspect_err(|e| {
                log::error!(
                    "Failed to write batch {} for cursor {}: {}",
                    batch_key,
                    cursor_id,
                    e
                )
            })?;
        log::info!(
            "Wrote {} records to {}/{} (running total {})",
            fetched,
            descriptor.namespace,
            batch_key,
            total_fetched
        );

        update_existing(self.cursors, table, cursor_id, &run.next_token, total_fetched)
            .await
            .inspect_err(|e| {
                log::error!(
                    "Batch {} written but cursor {} not advanced: {}",
                    batch_key,
                    cursor_id,
                    e
                )
            })?;

        if run.complete {
            log::info!(
                "Query run {} complete with {} records",
                cursor_id,
                total_fetched
            );
        }

        Ok(FetchOutcome::Advanced(CycleReport {
            cursor_id,
            started_run: resume.is_fresh(),
            fetched,
            total_fetched,
            pages: run.pages,
            next_token: run.next_token,
            batch_key,
            complete: run.complete,
            interruption: run.interruption,
        }))
    }
}
