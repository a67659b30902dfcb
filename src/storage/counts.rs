//! Raw following-count samples.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::CountSample;
use crate::storage::{ObjectStore, read_json_optional, write_json};

/// Append-only count table kept as one JSON document.
#[derive(Clone)]
pub struct ObjectCountStore {
    store: Arc<dyn ObjectStore>,
    namespace: String,
}

impl ObjectCountStore {
    pub fn new(store: Arc<dyn ObjectStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// All samples in timestamp order.
    pub async fn samples(&self, table: &str) -> Result<Vec<CountSample>> {
        let samples: Option<Vec<CountSample>> =
            read_json_optional(self.store.as_ref(), &self.namespace, table).await?;
        let mut samples = samples.unwrap_or_default();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }

    /// Samples taken at or after `since`.
    pub async fn samples_since(&self, table: &str, since: DateTime<Utc>) -> Result<Vec<CountSample>> {
        let mut samples = self.samples(table).await?;
        samples.retain(|s| s.timestamp >= since);
        Ok(samples)
    }

    pub async fn append(&self, table: &str, sample: CountSample) -> Result<usize> {
        let mut samples = self.samples(table).await?;
        samples.push(sample);
        write_json(self.store.as_ref(), &self.namespace, table, &samples).await?;
        log::info!("{} count rows in {}", samples.len(), table);
        Ok(samples.len())
    }
}
