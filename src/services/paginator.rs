// src/services/paginator.rs

//! Bounded page loop for a single invocation.

use std::fmt;
use std::time::Duration;

use crate::error::SourceError;
use crate::models::{QueryDescriptor, Record};
use crate::services::PagedSource;

/// Why a page loop stopped before completion or the iteration cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interruption {
    /// The source failed; earlier pages are kept.
    Source(SourceError),
    /// A response carried no data field; treated as transient, not as the end.
    MissingData,
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interruption::Source(e) => write!(f, "{e}"),
            Interruption::MissingData => write!(f, "response carried no data"),
        }
    }
}

/// Everything one page loop produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageRun {
    pub records: Vec<Record>,
    /// Token to resume from: the last one the source handed out
    pub next_token: String,
    pub pages: u32,
    /// The source reported no further pages
    pub complete: bool,
    pub interruption: Option<Interruption>,
}

/// Drives the source from a starting token until a stop condition.
pub struct Paginator<'a> {
    source: &'a dyn PagedSource,
    page_delay: Duration,
}

impl<'a> Paginator<'a> {
    pub fn new(source: &'a dyn PagedSource, page_delay: Duration) -> Self {
        Self { source, page_delay }
    }

    /// Fetch pages starting at `start_token`.
    ///
    /// Stops after `max_iterations` pages, when the source returns an empty
    /// next token, or on the first failure. Never returns an error: failures
    /// are recorded in [`PageRun::interruption`].
    pub async fn run(&self, descriptor: &QueryDescriptor, start_token: &str) -> PageRun {
        let max_iterations = descriptor.max_iterations.max(1);
        let mut run = PageRun {
            next_token: start_token.to_string(),
            ..PageRun::default()
        };

        loop {
            let page = match self
                .source
                .fetch_page(&descriptor.account_id, descriptor.page_size, &run.next_token)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    log::warn!(
                        "Page request failed after {} pages, keeping token {:?}: {}",
                        run.pages,
                        run.next_token,
                        e
                    );
                    run.interruption = Some(Interruption::Source(e));
                    break;
                }
            };

            let Some(records) = page.records else {
                log::warn!(
                    "Response without data after {} pages, keeping token {:?}",
                    run.pages,
                    run.next_token
                );
                run.interruption = Some(Interruption::MissingData);
                break;
            };

            run.pages += 1;
            run.records.extend(records);
            run.next_token = page.next_token;

            if run.next_token.is_empty() {
                log::info!("Found all results after {} pages", run.pages);
                run.complete = true;
                break;
            }
            if run.pages >= max_iterations {
                log::info!(
                    "Reached max iterations ({}); will resume with {:?}",
                    max_iterations,
                    run.next_token
                );
                break;
            }
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        run
    }
}
