//! AWS S3 storage implementation.
//!
//! Each namespace is a bucket; keys are stored at the bucket root exactly as
//! named so downstream readers see `{id}-{ts}`, `{id}-merged`, and so on.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use log::info;

use crate::error::{AppError, Result};
use crate::storage::ObjectStore;

/// S3-backed object store.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create S3 storage from the ambient AWS configuration.
    pub async fn from_env() -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(Self::new(Client::new(&config)))
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn put_object(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        let len = bytes.len();
        self.client
            .put_object()
            .bucket(namespace)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::S3(format!("put s3://{namespace}/{key}: {e}")))?;

        info!("Wrote {} bytes to s3://{}/{}", len, namespace, key);
        Ok(())
    }

    async fn get_object(&self, namespace: &str, key: &str) -> Result<Vec<u8>> {
        let result = self
            .client
            .get_object()
            .bucket(namespace)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::S3(format!("read s3://{namespace}/{key}: {e}")))?;
                Ok(bytes.into_bytes().to_vec())
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Err(AppError::not_found(namespace, key))
                } else {
                    Err(AppError::S3(format!(
                        "get s3://{namespace}/{key}: {service_err}"
                    )))
                }
            }
        }
    }

    async fn list_keys(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(namespace)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AppError::S3(format!("list s3://{namespace}/{prefix}*: {e}")))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }

        // S3 already returns UTF-8 binary order; sort anyway so every backend agrees.
        keys.sort();
        Ok(keys)
    }
}
