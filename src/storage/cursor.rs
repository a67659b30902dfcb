//! Cursor persistence.
//!
//! A cursor table is an append-only list of query runs. Starting a new run
//! adds a row; later cycles of the same run update that row in place.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::CursorState;
use crate::storage::{ObjectStore, read_json_optional, write_json};

/// Durable store of per-query pagination state.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Most recently created row, if any.
    async fn latest_status(&self, table: &str) -> Result<Option<CursorState>>;

    /// Append a row for a new run and return its assigned id.
    async fn insert_status(
        &self,
        table: &str,
        total_fetched: u64,
        continuation_token: &str,
    ) -> Result<u64>;

    /// Advance an existing row; returns the number of rows affected.
    async fn update_status(
        &self,
        table: &str,
        id: u64,
        continuation_token: &str,
        total_fetched: u64,
    ) -> Result<u64>;

    /// Every row in creation order.
    async fn list_statuses(&self, table: &str) -> Result<Vec<CursorState>>;
}

/// Cursor tables kept as JSON documents in an object store.
///
/// Each table is one object holding all of its rows. Ids are assigned like
/// a serial primary key, starting at 1.
#[derive(Clone)]
pub struct ObjectCursorStore {
    store: Arc<dyn ObjectStore>,
    namespace: String,
}

impl ObjectCursorStore {
    pub fn new(store: Arc<dyn ObjectStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    async fn load(&self, table: &str) -> Result<Vec<CursorState>> {
        let rows: Option<Vec<CursorState>> =
            read_json_optional(self.store.as_ref(), &self.namespace, table).await?;
        let mut rows = rows.unwrap_or_default();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    async fn save(&self, table: &str, rows: &[CursorState]) -> Result<()> {
        write_json(self.store.as_ref(), &self.namespace, table, rows).await
    }
}

#[async_trait]
impl CursorStore for ObjectCursorStore {
    async fn latest_status(&self, table: &str) -> Result<Option<CursorState>> {
        Ok(self.load(table).await?.pop())
    }

    async fn insert_status(
        &self,
        table: &str,
        total_fetched: u64,
        continuation_token: &str,
    ) -> Result<u64> {
        let mut rows = self.load(table).await?;
        let id = rows.last().map_or(1, |row| row.id + 1);
        let now = Utc::now();
        rows.push(CursorState {
            id,
            total_fetched,
            continuation_token: continuation_token.to_string(),
            started_at: now,
            updated_at: now,
        });
        self.save(table, &rows).await?;

        log::info!("Inserted cursor row {} into {}", id, table);
        Ok(id)
    }

    async fn update_status(
        &self,
        table: &str,
        id: u64,
        continuation_token: &str,
        total_fetched: u64,
    ) -> Result<u64> {
        let mut rows = self.load(table).await?;
        let Some(row) = rows.iter_mut().find(|row| row.id == id) else {
            return Ok(0);
        };
        row.continuation_token = continuation_token.to_string();
        row.total_fetched = total_fetched;
        row.updated_at = Utc::now();
        self.save(table, &rows).await?;

        log::info!(
            "Updated cursor row {} in {}: next={:?}, total={}",
            id,
            table,
            continuation_token,
            total_fetched
        );
        Ok(1)
    }

    async fn list_statuses(&self, table: &str) -> Result<Vec<CursorState>> {
        self.load(table).await
    }
}

/// Update a row and fail if nothing was touched.
pub async fn update_existing(
    cursors: &dyn CursorStore,
    table: &str,
    id: u64,
    continuation_token: &str,
    total_fetched: u64,
) -> Result<()> {
    let affected = cursors
        .update_status(table, id, continuation_token, total_fetched)
        .await?;
    if affected == 0 {
        return Err(AppError::cursor_store(
            table,
            format!("row {id} disappeared before update"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> ObjectCursorStore {
        ObjectCursorStore::new(Arc::new(MemoryStorage::new()), "state")
    }

    #[tokio::test]
    async fn test_empty_table_has_no_status() {
        let cursors = store();
        assert!(cursors.latest_status("querystatus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_assigns_serial_ids() {
        let cursors = store();
        let first = cursors.insert_status("t", 10, "a").await.unwrap();
        let second = cursors.insert_status("t", 0, "").await.unwrap();
        assert_eq!((first, second), (1, 2));

        let latest = cursors.latest_status("t").await.unwrap().unwrap();
        assert_eq!(latest.id, 2);
        assert_eq!(cursors.list_statuses("t").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_touches_only_target_row() {
        let cursors = store();
        let id = cursors.insert_status("t", 5, "a").await.unwrap();
        cursors.insert_status("other", 1, "z").await.unwrap();

        assert_eq!(cursors.update_status("t", id, "b", 9).await.unwrap(), 1);
        let row = cursors.latest_status("t").await.unwrap().unwrap();
        assert_eq!(row.continuation_token, "b");
        assert_eq!(row.total_fetched, 9);

        let other = cursors.latest_status("other").await.unwrap().unwrap();
        assert_eq!(other.continuation_token, "z");
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let cursors = store();
        assert_eq!(cursors.update_status("t", 42, "b", 1).await.unwrap(), 0);
        let err = update_existing(&cursors, "t", 42, "b", 1).await.unwrap_err();
        assert!(matches!(err, AppError::CursorStore { .. }));
    }
}
