// src/lambda/mod.rs

//! AWS Lambda handler for the crawler.
//!
//! One function serves every trigger:
//! 1. Scheduled events (no `action`) run a fetch cycle, merging on completion
//! 2. `merge`, `diff` and their backfill variants operate on stored batches
//! 3. `count` and `dump_counts` maintain the published count files

use std::sync::Arc;
use std::time::Instant;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde_json::{Value, json};
use tracing::{error, info, instrument};

use crate::config::{ConfigLoader, finalize};
use crate::error::Result;
use crate::models::Config;
use crate::pipeline::{Pipeline, invoke};
use crate::services::HttpFollowingSource;
use crate::storage::ObjectStore;
use crate::storage::s3::S3Storage;

/// Default object key of the deployed configuration.
pub const DEFAULT_CONFIG_KEY: &str = "config.toml";

/// Build the pipeline from the ambient AWS environment.
///
/// Configuration is read from `CONFIG_NAMESPACE`/`CONFIG_KEY` when a
/// namespace is set. Only a missing object falls back to defaults; a
/// malformed one fails the cold start. Env overrides apply last.
pub async fn build_pipeline() -> Result<Pipeline> {
    let objects: Arc<dyn ObjectStore> = Arc::new(S3Storage::from_env().await?);

    let config = match std::env::var("CONFIG_NAMESPACE") {
        Ok(namespace) => {
            let key =
                std::env::var("CONFIG_KEY").unwrap_or_else(|_| DEFAULT_CONFIG_KEY.to_string());
            ConfigLoader::new(objects.clone(), namespace)
                .load_or_default(&key)
                .await?
        }
        Err(_) => {
            info!("CONFIG_NAMESPACE not set, using default configuration");
            Config::default()
        }
    };
    let config = finalize(config)?;

    let source = Arc::new(HttpFollowingSource::new(&config.source)?);
    Ok(Pipeline::new(config, objects, source))
}

/// Main Lambda handler function.
#[instrument(skip(pipeline, event))]
pub async fn handler(
    pipeline: &Pipeline,
    event: LambdaEvent<Value>,
) -> std::result::Result<Value, LambdaError> {
    let start = Instant::now();
    let (payload, _context) = event.into_parts();
    info!("Received event: {}", payload);

    match invoke(pipeline, &payload).await {
        Ok((action, body)) => {
            let elapsed = start.elapsed().as_millis() as u64;
            info!("{} completed in {}ms", action, elapsed);
            Ok(json!({
                "status": "success",
                "action": action,
                "result": body,
                "execution_time_ms": elapsed,
            }))
        }
        Err(e) => {
            // Failing the invocation lets the trigger retry it.
            error!(
                "Invocation failed after {}ms: {}",
                start.elapsed().as_millis(),
                e
            );
            Err(e.into())
        }
    }
}
