//! Store configuration
//!
//! [`GraphConfig`] gathers everything needed to build a [`Graph`](crate::Graph):
//! where the database lives, which embedding provider to use and the search
//! defaults. It loads from TOML or from the environment.
//!
//! # Examples
//!
//! ```rust
//! use personal_graph_core::config::GraphConfig;
//!
//! let config = GraphConfig::from_toml_str(r#"
//!     [database]
//!     url = "/tmp/graph.db"
//!
//!     [search]
//!     merge_threshold = 0.5
//! "#).unwrap();
//! assert_eq!(config.search.default_limit, 5);
//! ```

use crate::db::ConnectionMode;
use crate::operations::error::{GraphError, Result};
use personal_graph_embeddings::{DistanceMetric, EmbeddingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DB_URL_ENV: &str = "PERSONAL_GRAPH_DB_URL";
pub const DB_AUTH_TOKEN_ENV: &str = "PERSONAL_GRAPH_DB_AUTH_TOKEN";
const LIBSQL_URL_ENV: &str = "LIBSQL_URL";
const LIBSQL_AUTH_TOKEN_ENV: &str = "LIBSQL_AUTH_TOKEN";

const DEFAULT_DIR: &str = ".personal-graph";
const DEFAULT_FILE: &str = "graph.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Local file path or `libsql://` / `https://` URL
    pub url: Option<String>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Overrides the embedding provider's native metric
    pub metric: Option<DistanceMetric>,
    pub merge_threshold: f32,
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            metric: None,
            merge_threshold: 0.9,
            default_limit: 5,
        }
    }
}

impl DatabaseConfig {
    /// Resolve the configured location, defaulting to `~/.personal-graph/graph.db`
    pub fn connection_mode(&self) -> Result<ConnectionMode> {
        match &self.url {
            Some(url) => Ok(ConnectionMode::from_url(url, self.auth_token.clone())),
            None => {
                let home = dirs::home_dir()
                    .ok_or_else(|| GraphError::config("Cannot determine home directory"))?;
                Ok(ConnectionMode::Local(
                    home.join(DEFAULT_DIR).join(DEFAULT_FILE),
                ))
            }
        }
    }
}

impl GraphConfig {
    /// Defaults overlaid with database settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`GraphConfig::from_env`] with an explicit variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let mut config = Self::default();
        config.database.url = non_empty(DB_URL_ENV).or_else(|| non_empty(LIBSQL_URL_ENV));
        config.database.auth_token =
            non_empty(DB_AUTH_TOKEN_ENV).or_else(|| non_empty(LIBSQL_AUTH_TOKEN_ENV));
        config
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| GraphError::config(format!("Invalid TOML configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            GraphError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.embedding.validate().map_err(GraphError::Config)?;

        if !self.search.merge_threshold.is_finite() || self.search.merge_threshold < 0.0 {
            return Err(GraphError::config(
                "merge_threshold must be a non-negative number",
            ));
        }
        if self.search.default_limit == 0 {
            return Err(GraphError::config("default_limit must be greater than 0"));
        }
        if let Some(url) = &self.database.url {
            if url.trim().is_empty() {
                return Err(GraphError::config("database url cannot be empty"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use personal_graph_embeddings::ProviderKind;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GraphConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.merge_threshold, 0.9);
        assert_eq!(config.embedding.provider, ProviderKind::Hashing);
        assert!(config.search.metric.is_none());
    }

    #[test]
    fn test_toml_overrides() {
        let config = GraphConfig::from_toml_str(
            r#"
            [database]
            url = "libsql://graph.turso.io"
            auth_token = "secret"

            [embedding]
            provider = "open_ai"
            model_name = "text-embedding-3-small"
            dimension = 1536

            [search]
            metric = "cosine"
            default_limit = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.embedding.provider, ProviderKind::OpenAi);
        assert_eq!(config.search.metric, Some(DistanceMetric::Cosine));
        assert_eq!(config.search.default_limit, 10);
        assert!(matches!(
            config.database.connection_mode().unwrap(),
            ConnectionMode::Remote { .. }
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            GraphConfig::from_toml_str("[search]\ndefault_limit = 0"),
            Err(GraphError::Config(_))
        ));
        assert!(matches!(
            GraphConfig::from_toml_str("[embedding]\ndimension = 0"),
            Err(GraphError::Config(_))
        ));
        assert!(matches!(
            GraphConfig::from_toml_str("[search\n"),
            Err(GraphError::Config(_))
        ));
    }

    #[test]
    fn test_env_lookup_prefers_own_variables() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (DB_URL_ENV, "/data/graph.db"),
            (LIBSQL_URL_ENV, "libsql://ignored.turso.io"),
            (LIBSQL_AUTH_TOKEN_ENV, "fallback-token"),
        ]);
        let config = GraphConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.url.as_deref(), Some("/data/graph.db"));
        assert_eq!(config.database.auth_token.as_deref(), Some("fallback-token"));
        assert!(matches!(
            config.database.connection_mode().unwrap(),
            ConnectionMode::Local(path) if path == PathBuf::from("/data/graph.db")
        ));
    }

    #[test]
    fn test_missing_url_defaults_under_home() {
        let config = GraphConfig::from_lookup(|_| None);
        if let Ok(ConnectionMode::Local(path)) = config.database.connection_mode() {
            assert!(path.ends_with(".personal-graph/graph.db"));
        }
    }
}
