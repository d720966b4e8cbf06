/// OpenAI-compatible embedding client
///
/// Provides an async HTTP client for any `/embeddings` endpoint that speaks the
/// OpenAI wire format (OpenAI, LiteLLM proxies, local inference servers) with:
/// - Per-request timeout
/// - Bounded retry with exponential backoff on rate limits, 5xx and timeouts
/// - Dimension checking of every returned vector
use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result};
use crate::metric::DistanceMetric;
use crate::provider::{check_dimension, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// OpenAI API base URL
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 500;

/// Upper bound on any single backoff sleep
const BACKOFF_MAX_MS: u64 = 30_000;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Thread-safe client for an OpenAI-compatible embeddings API
#[derive(Clone)]
pub struct OpenAiEmbedder {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
    model_name: String,
    dimension: usize,
    max_retries: u32,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl OpenAiEmbedder {
    /// Build from config, reading the API key from `config.api_key_env`
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            EmbeddingError::ConfigError(format!(
                "{} is not set; an API key is required for the open_ai provider",
                config.api_key_env
            ))
        })?;
        Self::new(config, api_key)
    }

    /// Build from config with an explicit API key
    pub fn new(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model_name: config.model_name.clone(),
            dimension: config.dimension,
            max_retries: config.max_retries,
        })
    }

    /// Execute a request with retry on transient failures
    async fn execute_request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0u32;

        loop {
            match self.send_request(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let retry_after = match &e {
                        EmbeddingError::RateLimited(secs) => Some(*secs),
                        _ => None,
                    };
                    let backoff = calculate_backoff(attempt, retry_after);
                    warn!(
                        attempt,
                        wait_ms = backoff,
                        error = %e,
                        "Embedding request failed, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single request to the API
    async fn send_request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model_name,
            input: texts.to_vec(),
            dimensions: self.requested_dimensions(),
        };

        debug!(model = %self.model_name, inputs = texts.len(), "Sending embedding request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), body, retry_after));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        self.collect_vectors(parsed, texts.len())
    }

    /// Only the text-embedding-3 family accepts a `dimensions` override
    fn requested_dimensions(&self) -> Option<usize> {
        self.model_name
            .starts_with("text-embedding-3")
            .then_some(self.dimension)
    }

    fn collect_vectors(
        &self,
        mut response: EmbeddingResponse,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>> {
        if response.data.len() != expected {
            return Err(EmbeddingError::EmptyResponse);
        }
        response.data.sort_by_key(|d| d.index);

        response
            .data
            .into_iter()
            .map(|d| {
                check_dimension(self.dimension, &d.embedding)?;
                Ok(d.embedding)
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn native_metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Cannot generate embedding for empty text".to_string(),
            ));
        }
        self.execute_request(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResponse)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.is_empty()) {
            return Err(EmbeddingError::InvalidInput(
                "Cannot generate embedding for empty text".to_string(),
            ));
        }
        self.execute_request(texts).await
    }
}

/// Map a non-success status to an error
fn classify_error(status: u16, body: String, retry_after: Option<u64>) -> EmbeddingError {
    match status {
        429 => EmbeddingError::RateLimited(retry_after.unwrap_or(1)),
        _ => EmbeddingError::Api { status, body },
    }
}

/// Exponential backoff, honouring a server-provided retry-after when larger
fn calculate_backoff(attempt: u32, retry_after_secs: Option<u64>) -> u64 {
    let exponential = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let server = retry_after_secs.unwrap_or(0).saturating_mul(1000);
    exponential.max(server).min(BACKOFF_MAX_MS)
}
