//! In-memory object store for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::ObjectStore;

type Objects = BTreeMap<(String, String), Vec<u8>>;

/// Object store held entirely in a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<Objects>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> Result<MutexGuard<'_, Objects>> {
        self.objects
            .lock()
            .map_err(|_| AppError::Io(std::io::Error::other("memory storage lock poisoned")))
    }

    /// Number of objects in a namespace.
    pub fn len(&self, namespace: &str) -> usize {
        self.objects()
            .map(|objects| objects.keys().filter(|(ns, _)| ns == namespace).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn put_object(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects()?
            .insert((namespace.to_string(), key.to_string()), bytes);
        Ok(())
    }

    async fn get_object(&self, namespace: &str, key: &str) -> Result<Vec<u8>> {
        self.objects()?
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| AppError::not_found(namespace, key))
    }

    async fn list_keys(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects()?
            .keys()
            .filter(|(ns, key)| ns == namespace && key.starts_with(prefix))
            .map(|(_, key)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let storage = MemoryStorage::new();
        storage.put_object("a", "1-1", b"x".to_vec()).await.unwrap();
        storage.put_object("b", "1-2", b"y".to_vec()).await.unwrap();

        assert_eq!(storage.list_keys("a", "1-").await.unwrap(), vec!["1-1"]);
        assert!(storage.get_object("a", "1-2").await.unwrap_err().is_not_found());
        assert_eq!(storage.len("b"), 1);
    }
}
