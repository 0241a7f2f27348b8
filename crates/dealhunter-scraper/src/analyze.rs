//! Model-assisted fallback extraction.
//!
//! Used when the DOM ladders could not find a usable title. Two analyzers
//! share one contract: [`ModelAnalyzer`] asks an OpenAI-compatible chat model
//! for structured JSON, and [`PatternAnalyzer`] reads the text with plain
//! patterns. The model path degrades to the pattern path on any failure, so
//! analysis always produces a result.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use dealhunter_core::{AppConfig, Availability, ExtractionResult};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::EngineError;
use crate::price::first_number;

/// Characters of scraped text sent to the model.
const MAX_PROMPT_TEXT: usize = 12_000;
const MAX_PATTERN_TITLE: usize = 100;
const DEFAULT_TITLE: &str = "Imported Product";

/// Brand tokens searched for in scraped text, in priority order.
const STORE_TOKENS: [(&str, &str); 6] = [
    ("amazon", "Amazon"),
    ("amzn", "Amazon"),
    ("walmart", "Walmart"),
    ("target", "Target"),
    ("meijer", "Meijer"),
    ("lego", "Lego"),
];

/// Label lines of the extraction digest, never a product name.
const DIGEST_LABELS: [&str; 2] = ["Price:", "Availability:"];

static DOLLAR_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s*(\d[\d,]*(?:\.\d+)?)").expect("valid dollar price regex")
});

/// Turns scraped page text plus a candidate image into a product record.
pub trait ProductAnalyzer: Send + Sync {
    /// Never fails: implementations degrade to pattern parsing.
    fn analyze(
        &self,
        text: &str,
        candidate_image: Option<&str>,
    ) -> impl Future<Output = ExtractionResult> + Send;
}

/// Text-pattern extraction. Always available and infallible.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    #[must_use]
    pub fn extract(text: &str, candidate_image: Option<&str>) -> ExtractionResult {
        let lower = text.to_lowercase();
        let retailer = STORE_TOKENS
            .iter()
            .find(|(token, _)| lower.contains(token))
            .map(|(_, store)| (*store).to_string());

        let price = DOLLAR_PRICE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().replace(',', ""));

        let title = text
            .lines()
            .map(str::trim)
            .filter(|line| !DIGEST_LABELS.iter().any(|label| line.starts_with(label)))
            .find(|line| line.chars().count() > 10)
            .map_or_else(
                || DEFAULT_TITLE.to_string(),
                |line| line.chars().take(MAX_PATTERN_TITLE).collect::<String>().trim().to_string(),
            );

        ExtractionResult {
            title: Some(title),
            price,
            availability: Availability::InStock,
            image: candidate_image.map(str::to_string),
            all_images: Vec::new(),
            description: String::new(),
            retailer,
        }
    }
}

impl ProductAnalyzer for PatternAnalyzer {
    fn analyze(
        &self,
        text: &str,
        candidate_image: Option<&str>,
    ) -> impl Future<Output = ExtractionResult> + Send {
        std::future::ready(Self::extract(text, candidate_image))
    }
}

#[derive(Debug, Error)]
enum ExtractionModelError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model endpoint returned HTTP {0}")]
    Status(u16),

    #[error("model response had no message content")]
    EmptyContent,

    #[error("model content is not the expected JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shape the model is instructed to answer with.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelProduct {
    name: Option<String>,
    price: Option<Value>,
    store: Option<String>,
    availability: Option<String>,
    image_url: Option<String>,
}

impl ModelProduct {
    fn into_result(self) -> ExtractionResult {
        let price = match self.price {
            Some(Value::String(s)) => first_number(&s).map(|(normalized, _)| normalized),
            Some(Value::Number(n)) => first_number(&n.to_string()).map(|(normalized, _)| normalized),
            _ => None,
        };
        ExtractionResult {
            title: non_blank(self.name),
            price,
            availability: self
                .availability
                .as_deref()
                .map(Availability::from_text)
                .unwrap_or_default(),
            image: non_blank(self.image_url),
            all_images: Vec::new(),
            description: String::new(),
            retailer: non_blank(self.store),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Removes markdown code fences some models wrap around JSON.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct ModelAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ModelAnalyzer {
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn request(
        &self,
        text: &str,
        candidate_image: Option<&str>,
    ) -> Result<ExtractionResult, ExtractionModelError> {
        let excerpt: String = text.chars().take(MAX_PROMPT_TEXT).collect();
        let req_body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                {
                    "role": "system",
                    "content": "Extract product details from scraped e-commerce page text. Return JSON with keys: name, price, store, availability, imageUrl. Use null for any field you cannot find."
                },
                {
                    "role": "user",
                    "content": format!(
                        "Scraped page text:\n\"\"\"{excerpt}\"\"\"\n\nCandidate main image URL: \"{image}\"\n\n\
                         Return: name (exact product name); price (number only, no currency symbol; the product price only, never a shipping fee, delivery cost or free-shipping threshold); \
                         store (retailer name, e.g. Amazon, Walmart); availability (\"In Stock\" or \"Out of Stock\"); \
                         imageUrl (the candidate URL if it looks right, otherwise a better one from the text).",
                        image = candidate_image.unwrap_or_default(),
                    )
                }
            ],
            "temperature": 0.1
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExtractionModelError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        let content = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .ok_or(ExtractionModelError::EmptyContent)?;

        let product: ModelProduct = serde_json::from_str(strip_code_fences(content))?;
        Ok(product.into_result())
    }
}

impl ProductAnalyzer for ModelAnalyzer {
    async fn analyze(&self, text: &str, candidate_image: Option<&str>) -> ExtractionResult {
        match self.request(text, candidate_image).await {
            Ok(result) => {
                tracing::info!(model = %self.model, "model-assisted extraction succeeded");
                result
            }
            Err(e) => {
                tracing::warn!(
                    model = %self.model,
                    error = %e,
                    "model-assisted extraction failed; using text patterns"
                );
                PatternAnalyzer::extract(text, candidate_image)
            }
        }
    }
}

/// Analyzer chosen at configuration time.
#[derive(Debug, Clone)]
pub enum Analyzer {
    Model(ModelAnalyzer),
    Pattern(PatternAnalyzer),
}

impl Analyzer {
    /// The model analyzer when a credential is configured, otherwise the
    /// pattern analyzer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] if the model's HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, EngineError> {
        match &config.llm_api_key {
            Some(key) => Ok(Self::Model(ModelAnalyzer::new(
                key.clone(),
                config.llm_model.clone(),
                config.llm_base_url.clone(),
                Duration::from_secs(config.http_timeout_secs),
            )?)),
            None => {
                tracing::warn!("no extraction-model credential configured; weak pages use text patterns");
                Ok(Self::Pattern(PatternAnalyzer))
            }
        }
    }
}

impl ProductAnalyzer for Analyzer {
    async fn analyze(&self, text: &str, candidate_image: Option<&str>) -> ExtractionResult {
        match self {
            Self::Model(model) => model.analyze(text, candidate_image).await,
            Self::Pattern(pattern) => pattern.analyze(text, candidate_image).await,
        }
    }
}

#[cfg(test)]
#[path = "analyze_test.rs"]
mod tests;
