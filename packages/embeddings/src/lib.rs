/// Personal Graph Embeddings - Embedding Providers for Vector-Augmented Graphs
///
/// This crate provides the embedding side of the personal-graph store: a provider
/// abstraction that maps text to a fixed-width `f32` vector, the distance metrics
/// used to compare those vectors, and the concrete providers.
///
/// # Features
///
/// - **Provider Trait**: [`EmbeddingProvider`] is injected into the graph store at
///   construction; nothing in the workspace reaches for a global model
/// - **Offline Embedder**: [`HashingEmbedder`] produces deterministic feature-hashed
///   vectors, useful for tests and air-gapped installs
/// - **Remote Embedder**: [`OpenAiEmbedder`] talks to any OpenAI-compatible
///   `/embeddings` endpoint with a request timeout and bounded retry
/// - **Caching**: [`CachedEmbedder`] wraps any provider with an LRU cache
///
/// # Example
///
/// ```
/// use personal_graph_embeddings::{EmbeddingConfig, HashingEmbedder, EmbeddingProvider};
///
/// # tokio_test::block_on(async {
/// let embedder = HashingEmbedder::new(64);
/// let vector = embedder.embed("{\"name\":\"Jack\"}").await.unwrap();
/// assert_eq!(vector.len(), 64);
/// # });
/// ```
pub mod cache;
pub mod config;
pub mod error;
pub mod hashing;
pub mod metric;
pub mod openai;
pub mod provider;

// Re-export main types
pub use cache::CachedEmbedder;
pub use config::{EmbeddingConfig, ProviderKind};
pub use error::{EmbeddingError, Result};
pub use hashing::HashingEmbedder;
pub use metric::DistanceMetric;
pub use openai::OpenAiEmbedder;
pub use provider::{build_provider, normalize, EmbeddingProvider};
