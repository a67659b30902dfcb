//! AWS Lambda entry point for Follow Crawler
//!
//! Deploy with `cargo lambda build --release --features lambda`

use follow_crawler::lambda::{build_pipeline, handler};
use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Follow Crawler Lambda starting...");
    let pipeline = build_pipeline().await?;
    let pipeline = &pipeline;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handler(pipeline, event).await
    }))
    .await
}
