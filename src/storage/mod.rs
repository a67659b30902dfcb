//! Storage abstractions for batch, snapshot, and state persistence.
//!
//! Every backend exposes the same flat object model: a namespace (directory
//! or bucket) holding opaque keys.
//!
//! ```text
//! {namespace}/
//! ├── 12-1700000000000      # Raw batch: one fetch cycle of query run 12
//! ├── 12-1700000900000
//! ├── 12-merged             # Snapshot of run 12
//! ├── 11_12-added           # Diff outputs between runs 11 and 12
//! └── 11_12-deleted
//! ```

pub mod counts;
pub mod cursor;
pub mod local;
pub mod memory;
pub mod paths;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{AppError, Result};

// Re-export for convenience
pub use counts::ObjectCountStore;
pub use cursor::{CursorStore, ObjectCursorStore};
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Trait for blob storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any existing one.
    async fn put_object(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Read an object; fails with [`AppError::NotFound`] when absent.
    async fn get_object(&self, namespace: &str, key: &str) -> Result<Vec<u8>>;

    /// Keys starting with `prefix`, in ascending lexicographic order.
    async fn list_keys(&self, namespace: &str, prefix: &str) -> Result<Vec<String>>;

    /// Read an object, returning `None` when absent.
    async fn get_object_optional(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        match self.get_object(namespace, key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Read and decode a JSON object.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    namespace: &str,
    key: &str,
) -> Result<T> {
    let bytes = store.get_object(namespace, key).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read and decode a JSON object, returning `None` when absent.
pub async fn read_json_optional<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    namespace: &str,
    key: &str,
) -> Result<Option<T>> {
    match store.get_object_optional(namespace, key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode a value as compact JSON and write it.
pub async fn write_json<T: Serialize + ?Sized>(
    store: &dyn ObjectStore,
    namespace: &str,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    store.put_object(namespace, key, bytes).await
}

/// Reject keys that could escape a namespace on path-based backends.
pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key == "." || key == ".." {
        return Err(AppError::validation(format!("invalid object key '{key}'")));
    }
    Ok(())
}
