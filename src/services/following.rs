// src/services/following.rs

//! HTTP client for the following listing.
//!
//! Speaks the v2 users API: `GET /users/{id}/following` paged with
//! `pagination_token`, and `GET /users/{id}` for public metrics.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result, SourceError};
use crate::models::{Record, SourceConfig};
use crate::services::{CountSource, Page, PagedSource};

#[derive(Debug, Deserialize)]
struct FollowingResponse {
    #[serde(default)]
    data: Option<Vec<Record>>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default)]
    result_count: u64,
    #[serde(default)]
    next_token: Option<String>,
}

impl From<FollowingResponse> for Page {
    fn from(response: FollowingResponse) -> Self {
        let next_token = response
            .meta
            .and_then(|meta| meta.next_token)
            .unwrap_or_default();
        Page {
            records: response.data,
            next_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    following_count: u64,
}

/// reqwest-backed implementation of the source contracts.
pub struct HttpFollowingSource {
    client: Client,
    base_url: Url,
    bearer_token: String,
}

impl HttpFollowingSource {
    /// Create a configured client for the source API.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::config(format!(
                "source.api_base_url cannot be used as a base: {}",
                config.api_base_url
            )));
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            bearer_token: config.bearer_token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::Transient("base url cannot hold a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn following_url(
        &self,
        account_id: &str,
        page_size: u32,
        continuation_token: &str,
    ) -> std::result::Result<Url, SourceError> {
        let mut url = self.endpoint(&["users", account_id, "following"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("max_results", &page_size.to_string());
            if !continuation_token.is_empty() {
                query.append_pair("pagination_token", continuation_token);
            }
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> std::result::Result<Response, SourceError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let reset_at = response
                .headers()
                .get("x-rate-limit-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(SourceError::RateLimited { reset_at });
        }

        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(SourceError::Transient(format!("{status}: {message}")))
        } else {
            Err(SourceError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl PagedSource for HttpFollowingSource {
    async fn fetch_page(
        &self,
        account_id: &str,
        page_size: u32,
        continuation_token: &str,
    ) -> std::result::Result<Page, SourceError> {
        let url = self.following_url(account_id, page_size, continuation_token)?;
        let body: FollowingResponse = self.get(url).await?.json().await?;

        if let Some(meta) = &body.meta {
            log::debug!(
                "Page meta: result_count={}, next_token={:?}",
                meta.result_count,
                meta.next_token
            );
        }
        Ok(body.into())
    }
}

#[async_trait]
impl CountSource for HttpFollowingSource {
    async fn following_count(&self, account_id: &str) -> std::result::Result<u64, SourceError> {
        let mut url = self.endpoint(&["users", account_id])?;
        url.query_pairs_mut()
            .append_pair("user.fields", "public_metrics");

        let body: UserResponse = self.get(url).await?.json().await?;
        body.data
            .and_then(|user| user.public_metrics)
            .map(|metrics| metrics.following_count)
            .ok_or_else(|| SourceError::Transient("response carried no public_metrics".into()))
    }
}
