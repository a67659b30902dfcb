//! Scripted source fakes shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::Record;
use crate::services::{CountSource, Page, PagedSource};

/// Replays scripted responses in order and records the tokens requested.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Page, SourceError>>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<Page, SourceError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PagedSource for ScriptedSource {
    async fn fetch_page(
        &self,
        _account_id: &str,
        _page_size: u32,
        token: &str,
    ) -> Result<Page, SourceError> {
        self.requested.lock().unwrap().push(token.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Transient("script exhausted".into())))
    }
}

/// Always reports the same following count.
pub struct FixedCount(pub u64);

#[async_trait]
impl CountSource for FixedCount {
    async fn following_count(&self, _account_id: &str) -> Result<u64, SourceError> {
        Ok(self.0)
    }
}

/// Paged source and count source in one, as the HTTP client is.
pub struct ScriptedAccount {
    pub pages: ScriptedSource,
    pub count: u64,
}

impl ScriptedAccount {
    pub fn new(responses: Vec<Result<Page, SourceError>>, count: u64) -> Self {
        Self {
            pages: ScriptedSource::new(responses),
            count,
        }
    }
}

#[async_trait]
impl PagedSource for ScriptedAccount {
    async fn fetch_page(
        &self,
        account_id: &str,
        page_size: u32,
        token: &str,
    ) -> Result<Page, SourceError> {
        self.pages.fetch_page(account_id, page_size, token).await
    }
}

#[async_trait]
impl CountSource for ScriptedAccount {
    async fn following_count(&self, _account_id: &str) -> Result<u64, SourceError> {
        Ok(self.count)
    }
}

/// A page of records whose name and username equal their id.
pub fn page(ids: &[&str], next: &str) -> Result<Page, SourceError> {
    Ok(Page::new(
        ids.iter().map(|id| Record::new(*id, *id, *id)).collect(),
        next,
    ))
}
