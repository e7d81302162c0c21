//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`CohereProvider`]**: calls Cohere's `/v1/embed` with an `input_type`
//!   of `search_document` or `search_query`.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API.
//!
//! Also provides the vector utilities used by the index:
//! - [`cosine_similarity`] / [`cosine_distance`]
//! - [`vec_to_blob`] / [`blob_to_vec`] for SQLite BLOB storage
//!
//! # Retry Strategy
//!
//! Both hosted providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;

const COHERE_EMBED_URL: &str = "https://api.cohere.ai/v1/embed";
const OPENAI_EMBED_URL: &str = "https://api.openai.com/v1/embeddings";

/// What the embedded text will be used for. Cohere embeds documents and
/// queries into the same space but asks to be told which is which.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    SearchDocument,
    SearchQuery,
}

impl InputType {
    pub fn as_str(self) -> &'static str {
        match self {
            InputType::SearchDocument => "search_document",
            InputType::SearchQuery => "search_query",
        }
    }
}

/// A backend that turns texts into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"embed-english-v3.0"`).
    fn model_name(&self) -> &str;

    /// Embed `texts`, returning one vector per input in input order.
    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single question for nearest-neighbour search.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let results = provider
        .embed(&[text.to_string()], InputType::SearchQuery)
        .await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))
}

/// Embed `texts` in batches of `batch_size`; fails as a whole if any batch fails.
pub async fn embed_batched(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
    input_type: InputType,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = provider.embed(batch, input_type).await?;
        if vectors.len() != batch.len() {
            bail!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            );
        }
        out.extend(vectors);
    }
    Ok(out)
}

// ============ Disabled Provider ============

/// Always fails; used when `embedding.provider = "disabled"`.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Shared HTTP plumbing ============

struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl HttpEmbedder {
    fn new(config: &EmbeddingConfig, default_url: &str, api_key: String) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for {} provider", config.provider))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| default_url.to_string()),
            api_key,
            model,
            max_retries: config.max_retries,
        })
    }

    /// POST `body` with retry/backoff and return the parsed JSON response.
    async fn post(&self, label: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(provider = label, attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(provider = label, %status, "embedding request failed; will retry");
                        last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                        continue;
                    }

                    bail!("{} API error {}: {}", label, status, body_text);
                }
                Err(e) => {
                    warn!(provider = label, error = %e, "embedding request failed; will retry");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
    }
}

fn api_key_from_env(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

// ============ Cohere Provider ============

/// Embedding provider using Cohere's `POST /v1/embed`.
///
/// Requires `COHERE_API_KEY` unless a key is passed to [`CohereProvider::with_api_key`].
pub struct CohereProvider {
    http: HttpEmbedder,
}

impl CohereProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Self::with_api_key(config, api_key_from_env("COHERE_API_KEY")?)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            http: HttpEmbedder::new(config, COHERE_EMBED_URL, api_key)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for CohereProvider {
    fn model_name(&self) -> &str {
        &self.http.model
    }

    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.http.model,
            "texts": texts,
            "input_type": input_type.as_str(),
        });
        let json = self.http.post("Cohere", &body).await?;
        parse_cohere_response(&json)
    }
}

/// Accepts both the plain `embeddings: [[..]]` shape and the typed
/// `embeddings: {float: [[..]]}` shape.
fn parse_cohere_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .ok_or_else(|| anyhow!("Invalid Cohere response: missing embeddings"))?;
    let rows = match embeddings {
        serde_json::Value::Array(rows) => rows,
        serde_json::Value::Object(map) => map
            .get("float")
            .and_then(|f| f.as_array())
            .ok_or_else(|| anyhow!("Invalid Cohere response: missing float embeddings"))?,
        _ => bail!("Invalid Cohere response: embeddings has unexpected type"),
    };
    rows.iter().map(parse_vector).collect()
}

// ============ OpenAI Provider ============

/// Embedding provider using `POST /v1/embeddings`. Requires `OPENAI_API_KEY`.
/// OpenAI has no notion of input type, so documents and queries are embedded alike.
pub struct OpenAIProvider {
    http: HttpEmbedder,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Self::with_api_key(config, api_key_from_env("OPENAI_API_KEY")?)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            http: HttpEmbedder::new(config, OPENAI_EMBED_URL, api_key)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.http.model
    }

    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.http.model,
            "input": texts,
        });
        let json = self.http.post("OpenAI", &body).await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, parse_vector(embedding)?));
    }

    // Sort by index to ensure order matches input
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid embedding: expected an array of numbers"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid embedding: non-numeric component"))
        })
        .collect()
}

/// Create the provider named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"cohere"` | [`CohereProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "cohere" => Ok(Arc::new(CohereProvider::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// `1 - cosine_similarity`, in `[0.0, 2.0]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
