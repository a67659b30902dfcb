// src/config.rs

//! Configuration loading utilities.
//!
//! Local runs read `config.toml` from disk; deployed runs read it from the
//! object store. Either way env overrides are applied last and the result is
//! validated before anything is wired.

use std::path::Path;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::storage::ObjectStore;

/// Loads configuration objects from an object store namespace.
pub struct ConfigLoader {
    store: Arc<dyn ObjectStore>,
    namespace: String,
}

impl ConfigLoader {
    pub fn new(store: Arc<dyn ObjectStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Load `key` as TOML, or `None` when the object does not exist.
    ///
    /// An object that exists but does not parse is an error.
    pub async fn load_optional(&self, key: &str) -> Result<Option<Config>> {
        log::info!("Loading config from {}/{}", self.namespace, key);
        let Some(bytes) = self.store.get_object_optional(&self.namespace, key).await? else {
            return Ok(None);
        };

        let text = String::from_utf8(bytes).map_err(|e| {
            AppError::config(format!("Config file {key} is not valid UTF-8: {e}"))
        })?;
        Config::from_toml(&text).map(Some).map_err(|e| {
            AppError::config(format!("Config file {}/{} is invalid: {e}", self.namespace, key))
        })
    }

    /// Load `key` as TOML; fails if the object is missing.
    pub async fn load_config(&self, key: &str) -> Result<Config> {
        self.load_optional(key).await?.ok_or_else(|| {
            AppError::config(format!("Config file not found: {}/{}", self.namespace, key))
        })
    }

    /// Load `key`, using defaults only when the object is absent.
    pub async fn load_or_default(&self, key: &str) -> Result<Config> {
        match self.load_optional(key).await? {
            Some(config) => Ok(config),
            None => {
                log::warn!(
                    "Config file not found: {}/{}. Using default configuration.",
                    self.namespace,
                    key
                );
                Ok(Config::default())
            }
        }
    }
}

/// Apply env overrides to a loaded configuration and validate it.
pub fn finalize(mut config: Config) -> Result<Config> {
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Load the local configuration file.
///
/// A missing file falls back to defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    finalize(Config::load_or_default(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_loads_from_object_store() {
        let storage = Arc::new(MemoryStorage::new());
        let toml = r#"
            [source]
            page_delay_ms = 0

            [[queries]]
            kind = "following"
            account_id = "42"
            cursor_table = "querystatus"
            namespace = "accounts"
        "#;
        storage
            .put_object("config", "config.toml", toml.as_bytes().to_vec())
            .await
            .unwrap();

        let loader = ConfigLoader::new(storage, "config");
        let config = loader.load_config("config.toml").await.unwrap();
        assert_eq!(config.source.page_delay_ms, 0);
        assert_eq!(config.queries[0].account_id, "42");
        assert_eq!(config.queries[0].max_iterations, 14);
    }

    #[tokio::test]
    async fn test_missing_object_falls_back() {
        let loader = ConfigLoader::new(Arc::new(MemoryStorage::new()), "config");
        assert!(matches!(
            loader.load_config("config.toml").await,
            Err(AppError::Config(_))
        ));
        let config = loader.load_or_default("config.toml").await.unwrap();
        assert_eq!(config.queries.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_object_is_an_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .put_object("config", "config.toml", b"[[queries]\nkind = ".to_vec())
            .await
            .unwrap();

        let loader = ConfigLoader::new(storage, "config");
        assert!(matches!(
            loader.load_or_default("config.toml").await,
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_missing_path_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("config.toml"));
        assert_eq!(config.storage.state_namespace, "state");
    }
}
