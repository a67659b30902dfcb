//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{QueryDescriptor, QueryKind};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External source connection settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Object and state store locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-kind query definitions
    #[serde(default = "defaults::queries")]
    pub queries: Vec<QueryConfig>,

    /// Merge/count wiring
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Overlay values from environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("SOURCE_BEARER_TOKEN") {
            self.source.bearer_token = token;
        }
        if let Some(root) = lookup("STORAGE_ROOT") {
            self.storage.root_dir = root;
        }
        if let Some(delay) = lookup("PAGE_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.source.page_delay_ms = delay;
        }

        let account_id = lookup("SOURCE_ACCOUNT_ID");
        let page_size = lookup("PAGE_SIZE").and_then(|v| v.parse().ok());
        let max_iterations = lookup("MAX_ITERATIONS").and_then(|v| v.parse().ok());
        for query in &mut self.queries {
            if let Some(id) = &account_id {
                query.account_id = id.clone();
            }
            if let Some(size) = page_size {
                query.page_size = size;
            }
            if let Some(max) = max_iterations {
                query.max_iterations = max;
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.source.api_base_url)?;
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.storage.state_namespace.trim().is_empty() {
            return Err(AppError::validation("storage.state_namespace is empty"));
        }
        if self.storage.counts_namespace.trim().is_empty() {
            return Err(AppError::validation("storage.counts_namespace is empty"));
        }
        if self.pipeline.count_table.trim().is_empty() {
            return Err(AppError::validation("pipeline.count_table is empty"));
        }
        if self.queries.is_empty() {
            return Err(AppError::validation("No queries defined"));
        }

        let mut seen = HashSet::new();
        for query in &self.queries {
            let kind = query.kind.as_str();
            if !seen.insert(kind) {
                return Err(AppError::validation(format!(
                    "query kind '{kind}' defined more than once"
                )));
            }
            if query.account_id.trim().is_empty() {
                return Err(AppError::validation(format!("queries.{kind}.account_id is empty")));
            }
            if query.page_size == 0 {
                return Err(AppError::validation(format!("queries.{kind}.page_size must be > 0")));
            }
            if query.max_iterations == 0 {
                return Err(AppError::validation(format!(
                    "queries.{kind}.max_iterations must be > 0"
                )));
            }
            if query.cursor_table.trim().is_empty() || query.namespace.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "queries.{kind} needs a cursor_table and a namespace"
                )));
            }
        }
        Ok(())
    }

    /// Look up the query definition for a kind.
    pub fn query(&self, kind: &QueryKind) -> Result<&QueryConfig> {
        self.queries
            .iter()
            .find(|q| &q.kind == kind)
            .ok_or_else(|| AppError::config(format!("No query configured for kind '{kind}'")))
    }

    /// Build the immutable descriptor for a query kind.
    pub fn descriptor(&self, kind: &QueryKind) -> Result<QueryDescriptor> {
        let query = self.query(kind)?;
        Ok(QueryDescriptor {
            kind: query.kind.clone(),
            account_id: query.account_id.clone(),
            page_size: query.page_size,
            max_iterations: query.max_iterations,
            cursor_table: query.cursor_table.clone(),
            namespace: query.namespace.clone(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            queries: defaults::queries(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP settings for the external paged source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// API root, e.g. `https://api.twitter.com/2`
    #[serde(default = "defaults::api_base_url")]
    pub api_base_url: String,

    /// Bearer token; usually supplied via `SOURCE_BEARER_TOKEN`
    #[serde(default)]
    pub bearer_token: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Pause between page requests in milliseconds
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base_url: defaults::api_base_url(),
            bearer_token: String::new(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            page_delay_ms: defaults::page_delay(),
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for the local filesystem backend
    #[serde(default = "defaults::root_dir")]
    pub root_dir: String,

    /// Namespace holding cursor and count tables
    #[serde(default = "defaults::state_namespace")]
    pub state_namespace: String,

    /// Namespace receiving `hourly.json` and `daily.json`
    #[serde(default = "defaults::counts_namespace")]
    pub counts_namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: defaults::root_dir(),
            state_namespace: defaults::state_namespace(),
            counts_namespace: defaults::counts_namespace(),
        }
    }
}

/// One query kind and where its state and batches live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub kind: QueryKind,

    /// Account whose listing is crawled
    #[serde(default = "defaults::account_id")]
    pub account_id: String,

    /// Records requested per page
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Pages fetched per invocation at most
    #[serde(default = "defaults::max_iterations")]
    pub max_iterations: u32,

    /// Cursor table name
    pub cursor_table: String,

    /// Object namespace for batches, snapshots and diffs
    pub namespace: String,
}

/// Post-fetch wiring and count dumps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Merge automatically when a fetch cycle completes a run
    #[serde(default = "defaults::merge_on_complete")]
    pub merge_on_complete: bool,

    /// Days of raw samples written to `hourly.json`
    #[serde(default = "defaults::hourly_window_days")]
    pub hourly_window_days: i64,

    /// Table holding raw count samples
    #[serde(default = "defaults::count_table")]
    pub count_table: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            merge_on_complete: defaults::merge_on_complete(),
            hourly_window_days: defaults::hourly_window_days(),
            count_table: defaults::count_table(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use super::QueryConfig;
    use crate::models::QueryKind;

    // Source defaults
    pub fn api_base_url() -> String {
        "https://api.twitter.com/2".into()
    }
    pub fn user_agent() -> String {
        "follow-crawler/0.1".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn page_delay() -> u64 {
        500
    }

    // Query defaults
    pub fn account_id() -> String {
        "63796828".into()
    }
    pub fn page_size() -> u32 {
        1000
    }
    pub fn max_iterations() -> u32 {
        14
    }
    pub fn queries() -> Vec<QueryConfig> {
        vec![QueryConfig {
            kind: QueryKind::Following,
            account_id: account_id(),
            page_size: page_size(),
            max_iterations: max_iterations(),
            cursor_table: "querystatus".into(),
            namespace: "verified-accounts".into(),
        }]
    }

    // Storage defaults
    pub fn root_dir() -> String {
        "storage".into()
    }
    pub fn state_namespace() -> String {
        "state".into()
    }
    pub fn counts_namespace() -> String {
        "verified-counts".into()
    }

    // Pipeline defaults
    pub fn merge_on_complete() -> bool {
        true
    }
    pub fn hourly_window_days() -> i64 {
        3
    }
    pub fn count_table() -> String {
        "verifiedcount".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_page_size() {
        let mut config = Config::default();
        config.queries[0].page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_kinds() {
        let mut config = Config::default();
        let dup = config.queries[0].clone();
        config.queries.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.source.api_base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [source]
            page_delay_ms = 0

            [[queries]]
            kind = "following"
            cursor_table = "status_following"
            namespace = "following-batches"
            max_iterations = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.source.page_delay_ms, 0);
        assert_eq!(config.source.timeout_secs, 30);
        let descriptor = config.descriptor(&QueryKind::Following).unwrap();
        assert_eq!(descriptor.page_size, 1000);
        assert_eq!(descriptor.max_iterations, 2);
        assert_eq!(descriptor.cursor_table, "status_following");
        assert_eq!(descriptor.namespace, "following-batches");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn descriptor_for_unknown_kind_fails() {
        let config = Config::default();
        let kind = QueryKind::Custom("followers".into());
        assert!(matches!(config.descriptor(&kind), Err(AppError::Config(_))));
    }

    #[test]
    fn custom_kind_lookup_ignores_case() {
        let config = Config::from_toml(
            r#"
            [[queries]]
            kind = "Followers"
            cursor_table = "status_followers"
            namespace = "followers-batches"
            "#,
        )
        .unwrap();

        let descriptor = config.descriptor(&"followers".parse().unwrap()).unwrap();
        assert_eq!(descriptor.namespace, "followers-batches");
        assert!(config.descriptor(&"FOLLOWERS".parse().unwrap()).is_ok());
    }

    #[test]
    fn overrides_apply_to_every_query() {
        let vars: HashMap<&str, &str> = [
            ("SOURCE_BEARER_TOKEN", "secret"),
            ("PAGE_SIZE", "100"),
            ("MAX_ITERATIONS", "3"),
            ("PAGE_DELAY_MS", "nope"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.source.bearer_token, "secret");
        assert_eq!(config.source.page_delay_ms, 500);
        assert_eq!(config.queries[0].page_size, 100);
        assert_eq!(config.queries[0].max_iterations, 3);
    }
}
