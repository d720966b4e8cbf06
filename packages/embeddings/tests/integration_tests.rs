/// Integration tests for the embedding providers
/// Only the offline providers are exercised; the OpenAI-compatible client is
/// covered by unit tests that never touch the network.
use personal_graph_embeddings::{
    build_provider, DistanceMetric, EmbeddingConfig, EmbeddingError, EmbeddingProvider,
    HashingEmbedder, ProviderKind,
};
use std::sync::Arc;

fn hashing_config(dimension: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: ProviderKind::Hashing,
        dimension,
        cache_capacity: 16,
        ..EmbeddingConfig::default()
    }
}

#[tokio::test]
async fn test_built_provider_is_deterministic() {
    let provider = build_provider(&hashing_config(128)).unwrap();

    let payload = r#"{"id":"1","name":"Jack"}"#;
    let first = provider.embed(payload).await.unwrap();
    let second = provider.embed(payload).await.unwrap();

    assert_eq!(first.len(), 128);
    assert_eq!(first, second);
    assert_eq!(provider.native_metric().distance(&first, &second), 0.0);
}

#[tokio::test]
async fn test_cached_provider_matches_uncached() {
    let cached = build_provider(&hashing_config(64)).unwrap();
    let raw = HashingEmbedder::new(64);

    let text = "Jack knows James";
    assert_eq!(
        cached.embed(text).await.unwrap(),
        raw.embed(text).await.unwrap()
    );
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let provider = build_provider(&hashing_config(32)).unwrap();
    let texts = ["alpha", "beta", "gamma"];

    let batch = provider.embed_batch(&texts).await.unwrap();
    assert_eq!(batch.len(), 3);
    for (text, vector) in texts.iter().zip(&batch) {
        assert_eq!(&provider.embed(text).await.unwrap(), vector);
    }
}

#[tokio::test]
async fn test_concurrent_embeds_share_provider() {
    let provider: Arc<dyn EmbeddingProvider> = build_provider(&hashing_config(32)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let provider = provider.clone();
            tokio::spawn(async move { provider.embed(&format!("node {}", i % 2)).await })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let vectors: Vec<Vec<f32>> = results
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(vectors[0], vectors[2]);
    assert_eq!(vectors[1], vectors[3]);
    assert_ne!(vectors[0], vectors[1]);
}

#[tokio::test]
async fn test_empty_text_is_an_error() {
    let provider = build_provider(&hashing_config(32)).unwrap();
    assert!(matches!(
        provider.embed("").await,
        Err(EmbeddingError::InvalidInput(_))
    ));
}

#[test]
fn test_open_ai_provider_requires_api_key() {
    let config = EmbeddingConfig {
        api_key_env: "PERSONAL_GRAPH_TEST_MISSING_KEY".to_string(),
        ..EmbeddingConfig::open_ai()
    };
    assert!(matches!(
        build_provider(&config),
        Err(EmbeddingError::ConfigError(_))
    ));
}

#[test]
fn test_metric_deserializes_from_config_text() {
    let metric: DistanceMetric = serde_json::from_str("\"cosine\"").unwrap();
    assert_eq!(metric, DistanceMetric::Cosine);
}
