//! Text generation client.
//!
//! [`TextGenerator::generate`] never returns an error: every outcome,
//! including provider failures, comes back as a [`Generation`] so the caller
//! decides whether to show the apology from [`Generation::reply_text`] or to
//! try again.
//!
//! Only Gemini's `generateContent` API is implemented. Requests are sent once
//! (no retry) with the timeout from `generation.timeout_secs`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GenerationConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1/models";

/// Apology shown when the provider returned no usable text.
pub const EMPTY_REPLY: &str =
    "I apologize, but I couldn't generate a proper response. Please try rephrasing your question.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation request timed out")]
    Timeout,
    #[error("could not reach the generation service: {0}")]
    Connection(String),
    #[error("generation service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("unexpected generation response: {0}")]
    Malformed(String),
    #[error("generation is disabled")]
    Disabled,
}

impl GenerationError {
    /// The apology shown to the user for this failure.
    pub fn apology(&self) -> &'static str {
        match self {
            GenerationError::Timeout => {
                "The request took too long to process. Please try again."
            }
            GenerationError::Connection(_) => {
                "I'm having trouble connecting to the AI service. Please check your internet connection and try again."
            }
            GenerationError::Status { .. } | GenerationError::Disabled => {
                "I'm currently experiencing technical difficulties. Please try again in a moment."
            }
            GenerationError::Malformed(_) => {
                "I encountered an issue processing the response. Please try again."
            }
        }
    }

    /// Short machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Timeout => "timeout",
            GenerationError::Connection(_) => "connection",
            GenerationError::Status { .. } => "status",
            GenerationError::Malformed(_) => "malformed",
            GenerationError::Disabled => "disabled",
        }
    }
}

/// Result of one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Answer(String),
    /// The provider answered but produced no text.
    Empty,
    Failed(GenerationError),
}

impl Generation {
    /// Text to show the user: the answer itself or an apology.
    pub fn reply_text(&self) -> &str {
        match self {
            Generation::Answer(text) => text,
            Generation::Empty => EMPTY_REPLY,
            Generation::Failed(e) => e.apology(),
        }
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, Generation::Answer(_))
    }

    /// `"answered"`, `"empty"`, or the failure kind.
    pub fn status(&self) -> &'static str {
        match self {
            Generation::Answer(_) => "answered",
            Generation::Empty => "empty",
            Generation::Failed(e) => e.kind(),
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Generation;
}

// ============ Disabled ============

/// Used when `generation.provider = "disabled"`.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Generation {
        warn!("generation requested but no provider is configured");
        Generation::Failed(GenerationError::Disabled)
    }
}

// ============ Gemini ============

/// Client for Gemini's `models/{model}:generateContent`.
///
/// The key is read from `GEMINI_API_KEY` unless given to
/// [`GeminiGenerator::with_api_key`]. It is sent in the `x-goog-api-key`
/// header rather than the query string so it never appears in logged URLs.
pub struct GeminiGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    generation_config: Option<Value>,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let url = config.url.clone().unwrap_or_else(|| {
            format!("{}/{}:generateContent", GEMINI_BASE_URL, config.model)
        });
        Ok(Self {
            client,
            url,
            api_key,
            model: config.model.clone(),
            generation_config: generation_config(config),
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        if let Some(gc) = &self.generation_config {
            body["generationConfig"] = gc.clone();
        }
        body
    }

    async fn call(&self, prompt: &str) -> Result<Generation, GenerationError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(transport_error)?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| GenerationError::Malformed(format!("invalid JSON: {}", e)))?;
        parse_gemini_response(&value)
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Generation {
        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "calling Gemini");
        match self.call(prompt).await {
            Ok(generation) => {
                if generation == Generation::Empty {
                    warn!(model = %self.model, "Gemini returned an empty response");
                }
                generation
            }
            Err(e) => {
                match &e {
                    GenerationError::Timeout => warn!(model = %self.model, "Gemini request timed out"),
                    GenerationError::Connection(msg) => {
                        warn!(model = %self.model, error = %msg, "Gemini connection failed")
                    }
                    GenerationError::Status { code, body } => {
                        warn!(model = %self.model, code, body = %body, "Gemini returned an error status")
                    }
                    GenerationError::Malformed(msg) => {
                        warn!(model = %self.model, error = %msg, "Gemini response could not be parsed")
                    }
                    GenerationError::Disabled => {}
                }
                Generation::Failed(e)
            }
        }
    }
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Connection(e.to_string())
    }
}

fn generation_config(config: &GenerationConfig) -> Option<Value> {
    let mut gc = serde_json::Map::new();
    if let Some(t) = config.temperature {
        gc.insert("temperature".into(), json!(t));
    }
    if let Some(n) = config.max_output_tokens {
        gc.insert("maxOutputTokens".into(), json!(n));
    }
    if let Some(p) = config.top_p {
        gc.insert("topP".into(), json!(p));
    }
    if let Some(k) = config.top_k {
        gc.insert("topK".into(), json!(k));
    }
    if gc.is_empty() {
        None
    } else {
        Some(Value::Object(gc))
    }
}

/// Pull `candidates[0].content.parts[*].text` out of a Gemini response.
///
/// Multiple text parts are concatenated. A response with candidates but no
/// text (e.g. blocked by safety filters) is [`Generation::Empty`].
pub fn parse_gemini_response(value: &Value) -> Result<Generation, GenerationError> {
    let candidates = value
        .get("candidates")
        .and_then(Value::as_array)
        .ok_or_else(|| GenerationError::Malformed("missing candidates".to_string()))?;

    let Some(first) = candidates.first() else {
        return Ok(Generation::Empty);
    };

    let text: String = first
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Ok(Generation::Empty)
    } else {
        Ok(Generation::Answer(text.trim().to_string()))
    }
}

/// Build the generator named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        other => Err(anyhow!("Unknown generation provider: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_candidate_text() {
        let v = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "Dang gets " }, { "text": "heavy rain. " }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        });
        assert_eq!(
            parse_gemini_response(&v).unwrap(),
            Generation::Answer("Dang gets heavy rain.".to_string())
        );
    }

    #[test]
    fn blocked_or_blank_is_empty() {
        let blocked = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        assert_eq!(parse_gemini_response(&blocked).unwrap(), Generation::Empty);

        let blank = json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] });
        assert_eq!(parse_gemini_response(&blank).unwrap(), Generation::Empty);

        let none = json!({ "candidates": [] });
        assert_eq!(parse_gemini_response(&none).unwrap(), Generation::Empty);
    }

    #[test]
    fn missing_candidates_is_malformed() {
        let err = parse_gemini_response(&json!({ "error": "nope" })).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn each_failure_has_its_own_apology() {
        let failures = [
            GenerationError::Timeout,
            GenerationError::Connection("refused".into()),
            GenerationError::Status {
                code: 500,
                body: String::new(),
            },
            GenerationError::Malformed("x".into()),
        ];
        let mut apologies: Vec<&str> = failures.iter().map(|e| e.apology()).collect();
        apologies.push(EMPTY_REPLY);
        let mut deduped = apologies.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), apologies.len());
    }

    #[test]
    fn reply_text_and_status() {
        let answer = Generation::Answer("ok".into());
        assert_eq!(answer.reply_text(), "ok");
        assert_eq!(answer.status(), "answered");
        assert!(answer.is_answer());

        let failed = Generation::Failed(GenerationError::Timeout);
        assert_eq!(
            failed.reply_text(),
            "The request took too long to process. Please try again."
        );
        assert_eq!(failed.status(), "timeout");
        assert_eq!(Generation::Empty.reply_text(), EMPTY_REPLY);
    }

    #[test]
    fn request_body_carries_optional_sampling() {
        let config = GenerationConfig {
            provider: "gemini".into(),
            temperature: Some(0.5),
            top_k: Some(40),
            ..GenerationConfig::default()
        };
        let g = GeminiGenerator::with_api_key(&config, "k".into()).unwrap();
        assert!(g.url.ends_with("/gemini-1.5-flash:generateContent"));
        let body = g.request_body("hello");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert!(body["generationConfig"].get("topP").is_none());

        let plain = GeminiGenerator::with_api_key(&GenerationConfig::default(), "k".into())
            .unwrap()
            .request_body("hi");
        assert!(plain.get("generationConfig").is_none());
    }

    #[tokio::test]
    async fn disabled_generator_fails_softly() {
        let g = create_generator(&GenerationConfig::default()).unwrap();
        assert_eq!(
            g.generate("anything").await,
            Generation::Failed(GenerationError::Disabled)
        );
    }
}
