//! Local filesystem storage implementation.
//!
//! Each namespace is a directory under the root and each key a file inside
//! it. Used by the CLI and for development; production deployments use
//! `S3Storage`.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── state/                # Cursor and count tables
//! │   └── querystatus
//! └── verified-accounts/    # Batches, snapshots, diffs
//!     ├── 1-1700000000000
//!     └── 1-merged
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{ObjectStore, check_key};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a namespaced key.
    fn path(&self, namespace: &str, key: &str) -> Result<PathBuf> {
        check_key(namespace)?;
        check_key(key)?;
        Ok(self.root_dir.join(namespace).join(key))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn put_object(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path(namespace, key)?;
        self.write_bytes(&path, &bytes).await?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn get_object(&self, namespace: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.path(namespace, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::not_found(namespace, key))
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn list_keys(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        check_key(namespace)?;
        let dir = self.root_dir.join(namespace);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.ends_with(".tmp") {
                continue;
            }
            if name.starts_with(prefix) {
                keys.push(name);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
