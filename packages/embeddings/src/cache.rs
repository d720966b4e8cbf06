/// LRU caching wrapper around any embedding provider
use crate::error::{EmbeddingError, Result};
use crate::metric::DistanceMetric;
use crate::provider::{check_dimension, EmbeddingProvider};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Caches vectors by exact input text.
///
/// Graph payloads are re-embedded on every upsert and every similarity scan of the
/// merge pass, so repeated texts are common.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| EmbeddingError::ConfigError("cache_capacity must be > 0".to_string()))?;

        Ok(Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Clear the embedding cache
    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.clear();
    }

    /// Get cache statistics (size, capacity)
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        (cache.len(), cache.cap().get())
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn native_metric(&self) -> DistanceMetric {
        self.inner.native_metric()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        {
            let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(cached) = cache.get(text) {
                return Ok(cached.clone());
            }
        }

        // Lock is not held across the provider call
        let embedding = self.inner.embed(text).await?;
        check_dimension(self.inner.dimension(), &embedding)?;

        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.put(text.to_string(), embedding.clone());
        Ok(embedding)
    }
}
