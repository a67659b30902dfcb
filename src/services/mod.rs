// src/services/mod.rs

//! Service layer for talking to the external paged source.

mod following;
mod paginator;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::Record;

pub use following::HttpFollowingSource;
pub use paginator::{Interruption, PageRun, Paginator};

/// One page returned by the source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    /// `None` when the response carried no data field at all
    pub records: Option<Vec<Record>>,

    /// Token for the following page; empty when there is none
    pub next_token: String,
}

impl Page {
    pub fn new(records: Vec<Record>, next_token: impl Into<String>) -> Self {
        Self {
            records: Some(records),
            next_token: next_token.into(),
        }
    }

    /// A response without a data field.
    pub fn without_data(next_token: impl Into<String>) -> Self {
        Self {
            records: None,
            next_token: next_token.into(),
        }
    }
}

/// Cursor-paginated listing.
#[async_trait]
pub trait PagedSource: Send + Sync {
    /// Fetch the page starting at `continuation_token` (empty for the first).
    async fn fetch_page(
        &self,
        account_id: &str,
        page_size: u32,
        continuation_token: &str,
    ) -> Result<Page, SourceError>;
}

/// Source of the account's current following count.
#[async_trait]
pub trait CountSource: Send + Sync {
    async fn following_count(&self, account_id: &str) -> Result<u64, SourceError>;
}
