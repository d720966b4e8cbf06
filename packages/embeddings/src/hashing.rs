/// Deterministic feature-hashing embedder
///
/// Produces vectors without any model: word tokens and character trigrams are
/// hashed (xxh64) into `dimension` signed buckets and the result is L2 normalized.
/// Identical text always maps to the identical vector, and texts sharing most of
/// their tokens land close together under the Euclidean metric. Good enough for
/// tests, offline use and de-duplication of near-identical payloads; not a
/// substitute for a semantic model.
use crate::error::{EmbeddingError, Result};
use crate::metric::DistanceMetric;
use crate::provider::{normalize, EmbeddingProvider};
use async_trait::async_trait;
use xxhash_rust::xxh64::xxh64;

const DEFAULT_MODEL_NAME: &str = "feature-hash-v1";

/// Seeds keep token and trigram features in separate hash spaces
const TOKEN_SEED: u64 = 0x5eed_0001;
const TRIGRAM_SEED: u64 = 0x5eed_0003;

const TOKEN_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self::with_model_name(dimension, DEFAULT_MODEL_NAME.to_string())
    }

    pub fn with_model_name(dimension: usize, model_name: String) -> Self {
        Self {
            dimension: dimension.max(1),
            model_name,
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], seed: u64, weight: f32) {
        let hash = xxh64(feature, seed);
        let bucket = (hash % self.dimension as u64) as usize;
        // Top bit picks the sign so collisions tend to cancel rather than pile up
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    /// Synchronous core, shared by the trait impl and tests
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Cannot generate embedding for empty text".to_string(),
            ));
        }

        let lowered = text.to_lowercase();
        let mut vector = vec![0.0f32; self.dimension];
        let mut features = 0usize;

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            self.add_feature(&mut vector, token.as_bytes(), TOKEN_SEED, TOKEN_WEIGHT);
            features += 1;
        }

        let chars: Vec<char> = lowered.chars().collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            self.add_feature(&mut vector, trigram.as_bytes(), TRIGRAM_SEED, TRIGRAM_WEIGHT);
            features += 1;
        }

        if features == 0 {
            // Very short, punctuation-only input: hash the whole string
            self.add_feature(&mut vector, lowered.as_bytes(), TOKEN_SEED, TOKEN_WEIGHT);
        }

        Ok(normalize(&vector))
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn native_metric(&self) -> DistanceMetric {
        DistanceMetric::Euclidean
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_sync(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        DistanceMetric::Euclidean.distance(a, b)
    }

    #[test]
    fn test_deterministic() {
        let embedder = HashingEmbedder::new(128);
        let a = embedder.embed_sync("Jack knows James").unwrap();
        let b = embedder.embed_sync("Jack knows James").unwrap();
        assert_eq!(a, b);
        assert_eq!(distance(&a, &b), 0.0);
    }

    #[test]
    fn test_dimension_and_unit_length() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed_sync("some text to embed").unwrap();
        assert_eq!(v.len(), 64);

        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_insensitive() {
        let embedder = HashingEmbedder::new(128);
        let a = embedder.embed_sync("Hello World").unwrap();
        let b = embedder.embed_sync("hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_similar_text_is_closer() {
        let embedder = HashingEmbedder::new(384);
        let base = embedder
            .embed_sync("the quick brown fox jumps over the lazy dog")
            .unwrap();
        let near = embedder
            .embed_sync("the quick brown fox jumped over the lazy dog")
            .unwrap();
        let far = embedder
            .embed_sync("relational databases persist rows in tables")
            .unwrap();

        assert!(distance(&base, &near) < distance(&base, &far));
    }

    #[test]
    fn test_punctuation_only_input() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed_sync("{}").unwrap();
        assert!(v.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_empty_text_rejected() {
        let embedder = HashingEmbedder::new(16);
        assert!(matches!(
            embedder.embed_sync(""),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }
}
