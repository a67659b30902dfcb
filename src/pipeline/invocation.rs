// src/pipeline/invocation.rs

//! Transport-independent invocation payloads.
//!
//! A payload names its operation in `action`; a payload without one (such
//! as a scheduled trigger) runs a fetch cycle.

use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::QueryKind;

use super::fetch::FetchOutcome;
use super::pipeline::Pipeline;

/// One requested operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InvocationRequest {
    Fetch,
    Merge {
        #[serde(rename = "batchId", deserialize_with = "id_string")]
        batch_id: String,
    },
    Diff {
        #[serde(rename = "batchId1", deserialize_with = "id_string")]
        earlier: String,
        #[serde(rename = "batchId2", deserialize_with = "id_string")]
        later: String,
    },
    BackfillMerge {
        #[serde(rename = "minBatchId", deserialize_with = "id_number")]
        min: u64,
        #[serde(rename = "maxBatchId", deserialize_with = "id_number")]
        max: u64,
    },
    BackfillDiff {
        #[serde(rename = "minBatchId", deserialize_with = "id_number")]
        min: u64,
        #[serde(rename = "maxBatchId", deserialize_with = "id_number")]
        max: u64,
    },
    Count,
    DumpCounts,
}

/// Batch ids arrive as either JSON strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

fn id_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n),
        RawId::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("batch id '{s}' is not numeric"))),
    }
}

impl InvocationRequest {
    /// Parse a raw event payload.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        match payload.get("action") {
            None | Some(Value::Null) => Ok(InvocationRequest::Fetch),
            Some(_) => Ok(serde_json::from_value(payload.clone())?),
        }
    }

    /// Operation name for logs.
    pub fn action(&self) -> &'static str {
        match self {
            InvocationRequest::Fetch => "fetch",
            InvocationRequest::Merge { .. } => "merge",
            InvocationRequest::Diff { .. } => "diff",
            InvocationRequest::BackfillMerge { .. } => "backfill_merge",
            InvocationRequest::BackfillDiff { .. } => "backfill_diff",
            InvocationRequest::Count => "count",
            InvocationRequest::DumpCounts => "dump_counts",
        }
    }
}

/// Query kind named by a payload's optional `query` field.
pub fn query_kind(payload: &Value) -> Result<QueryKind> {
    match payload.get("query").and_then(Value::as_str) {
        Some(kind) => kind.parse().map_err(AppError::validation),
        None => Ok(QueryKind::Following),
    }
}

/// Parse a payload, run it, and return the action name with its summary.
///
/// Store and read failures come back as `Err` so the caller can fail the
/// whole invocation and let the scheduler retry it.
pub async fn invoke(pipeline: &Pipeline, payload: &Value) -> Result<(&'static str, Value)> {
    let request = InvocationRequest::from_payload(payload)?;
    let kind = query_kind(payload)?;
    let body = dispatch(pipeline, &kind, &request).await?;
    Ok((request.action(), body))
}

/// Run a request and summarise the result as JSON.
pub async fn dispatch(pipeline: &Pipeline, kind: &QueryKind, request: &InvocationRequest) -> Result<Value> {
    log::info!("Dispatching {} for query {}", request.action(), kind);

    let body = match request {
        InvocationRequest::Fetch => {
            let run = pipeline.fetch(kind).await?;
            let mut body = match &run.outcome {
                FetchOutcome::Advanced(report) => json!({
                    "progress": true,
                    "cursorId": report.cursor_id,
                    "fetched": report.fetched,
                    "totalFetched": report.total_fetched,
                    "pages": report.pages,
                    "complete": report.complete,
                    "batchKey": report.batch_key,
                    "interruption": report.interruption.as_ref().map(ToString::to_string),
                }),
                FetchOutcome::NoProgress { interruption } => json!({
                    "progress": false,
                    "interruption": interruption.as_ref().map(ToString::to_string),
                }),
            };
            if let Some(merge) = &run.merge {
                body["merged"] = json!({
                    "key": merge.key,
                    "records": merge.record_count,
                    "digest": merge.digest,
                });
            }
            body
        }
        InvocationRequest::Merge { batch_id } => {
            let (_, report) = pipeline.merge(kind, batch_id).await?;
            json!({
                "batchId": report.batch_id,
                "batches": report.batch_count,
                "records": report.record_count,
                "key": report.key,
                "digest": report.digest,
            })
        }
        InvocationRequest::Diff { earlier, later } => {
            let (_, report) = pipeline.diff(kind, earlier, later).await?;
            json!({
                "added": report.added,
                "deleted": report.deleted,
                "addedKey": report.added_key,
                "deletedKey": report.deleted_key,
            })
        }
        InvocationRequest::BackfillMerge { min, max } => {
            let reports = pipeline.merge_range(kind, *min, *max).await?;
            let merged: Vec<&str> = reports.iter().map(|r| r.batch_id.as_str()).collect();
            json!({ "merged": merged })
        }
        InvocationRequest::BackfillDiff { min, max } => {
            let reports = pipeline.diff_range(kind, *min, *max).await?;
            let diffs: Vec<Value> = reports
                .iter()
                .map(|r| {
                    json!({
                        "batchId1": r.earlier,
                        "batchId2": r.later,
                        "added": r.added,
                        "deleted": r.deleted,
                    })
                })
                .collect();
            json!({ "diffs": diffs })
        }
        InvocationRequest::Count => {
            let sample = pipeline.record_count().await?;
            json!({ "count": sample.count, "timestamp": sample.timestamp })
        }
        InvocationRequest::DumpCounts => {
            let report = pipeline.dump_counts().await?;
            json!({ "hourly": report.hourly, "daily": report.daily })
        }
    };

    Ok(body)
}
