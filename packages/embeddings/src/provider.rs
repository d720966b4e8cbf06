/// Embedding provider abstraction
///
/// The graph store never owns a model. It receives an `Arc<dyn EmbeddingProvider>`
/// at construction and calls `embed` for every payload it persists or searches for.
use crate::cache::CachedEmbedder;
use crate::config::{EmbeddingConfig, ProviderKind};
use crate::error::{EmbeddingError, Result};
use crate::hashing::HashingEmbedder;
use crate::metric::DistanceMetric;
use crate::openai::OpenAiEmbedder;
use async_trait::async_trait;
use std::sync::Arc;

/// Maps text to a fixed-width vector.
///
/// Implementations must be deterministic enough that embedding the same text twice
/// yields vectors at (near) zero distance under [`EmbeddingProvider::native_metric`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, for logging
    fn model_name(&self) -> &str;

    /// Width of every vector this provider returns
    fn dimension(&self) -> usize;

    /// The comparison the model's vectors are meant to be ranked with
    fn native_metric(&self) -> DistanceMetric {
        DistanceMetric::Euclidean
    }

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Build the configured provider, wrapped in an LRU cache
pub fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate().map_err(EmbeddingError::ConfigError)?;

    let inner: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::Hashing => Arc::new(HashingEmbedder::with_model_name(
            config.dimension,
            config.model_name.clone(),
        )),
        ProviderKind::OpenAi => Arc::new(OpenAiEmbedder::from_config(config)?),
    };

    tracing::info!(
        model = inner.model_name(),
        dimension = inner.dimension(),
        "Embedding provider ready"
    );

    Ok(Arc::new(CachedEmbedder::new(inner, config.cache_capacity)?))
}

/// L2 normalize embedding vector
pub fn normalize(input: &[f32]) -> Vec<f32> {
    let magnitude = input
        .iter()
        .fold(0.0f32, |acc, &val| val.mul_add(val, acc))
        .sqrt();

    if magnitude > 0.0 {
        input.iter().map(|&val| val / magnitude).collect()
    } else {
        input.to_vec()
    }
}

/// Reject vectors that do not match the advertised width
pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let normalized = normalize(&[3.0, 4.0]);

        // 3/5 = 0.6, 4/5 = 0.8
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);

        let magnitude: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let normalized = normalize(&[0.0, 0.0, 0.0]);
        assert!(normalized.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(2, &[1.0, 2.0]).is_ok());
        assert!(matches!(
            check_dimension(3, &[1.0, 2.0]),
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_build_hashing_provider() {
        let config = EmbeddingConfig {
            dimension: 32,
            ..EmbeddingConfig::default()
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.dimension(), 32);
        assert_eq!(provider.embed("hello").await.unwrap().len(), 32);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = EmbeddingConfig {
            cache_capacity: 0,
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            build_provider(&config),
            Err(EmbeddingError::ConfigError(_))
        ));
    }
}
