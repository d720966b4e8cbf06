/// Configuration for embedding providers
use serde::{Deserialize, Serialize};

/// Largest vector width accepted from any provider
const MAX_SUPPORTED_DIMENSION: usize = 8192;

/// Which provider implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Deterministic local feature hashing (no network)
    Hashing,
    /// OpenAI-compatible `/embeddings` HTTP endpoint
    OpenAi,
}

/// Configuration for an embedding provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider implementation
    pub provider: ProviderKind,

    /// Model name or identifier sent to remote providers
    pub model_name: String,

    /// Width of every produced vector
    pub dimension: usize,

    /// Maximum cache size (number of embeddings to cache)
    pub cache_capacity: usize,

    /// Base URL of an OpenAI-compatible API (defaults to api.openai.com)
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Per-request timeout for remote providers
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Hashing,
            model_name: "feature-hash-v1".to_string(),
            dimension: 384,
            cache_capacity: 10000,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl EmbeddingConfig {
    /// Defaults for OpenAI's `text-embedding-3-small`
    pub fn open_ai() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model_name: "text-embedding-3-small".to_string(),
            dimension: 1536,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model_name.is_empty() {
            return Err("model_name cannot be empty".to_string());
        }

        if self.dimension == 0 {
            return Err("dimension must be greater than 0".to_string());
        }

        if self.dimension > MAX_SUPPORTED_DIMENSION {
            return Err(format!(
                "dimension cannot exceed {}",
                MAX_SUPPORTED_DIMENSION
            ));
        }

        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".to_string());
        }

        if self.provider == ProviderKind::OpenAi {
            if self.timeout_secs == 0 {
                return Err("timeout_secs must be greater than 0".to_string());
            }
            if self.api_key_env.is_empty() {
                return Err("api_key_env cannot be empty".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, ProviderKind::Hashing);
        assert_eq!(config.dimension, 384);
        assert_eq!(config.cache_capacity, 10000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EmbeddingConfig::default();

        config.model_name = String::new();
        assert!(config.validate().is_err());

        config.model_name = "test".to_string();
        config.dimension = 0;
        assert!(config.validate().is_err());

        config.dimension = 10000;
        assert!(config.validate().is_err());

        config.dimension = 384;
        config.cache_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_open_ai_requires_timeout() {
        let mut config = EmbeddingConfig::open_ai();
        assert!(config.validate().is_ok());

        config.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: EmbeddingConfig =
            serde_json::from_str(r#"{"provider": "open_ai", "dimension": 256}"#).unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.dimension, 256);
        assert_eq!(config.max_retries, 3);
    }
}
