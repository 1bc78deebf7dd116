//! Phrase generation service client
//!
//! Defines the `PhraseGenerator` seam used by the generation job and the
//! HTTP client for the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::GeminiConfig;
use crate::error::{PhraseError, Result};
use crate::utils::network::{classify_network_error, create_http_client, NetworkConfig};

const SERVICE_NAME: &str = "generation service";

/// Prompt sent to the generation service when none is configured
pub const DEFAULT_PROMPT: &str = r#"You are a poet whose only goal is to lift the reader's spirit. Write a single phrase that is deeply positive and exceptionally concise, focused on one inspiring feeling.

The phrase must do one of the following: pay a compliment, recall something important, or wish good luck.

Your answer must be a JSON object containing exactly two keys:
1. "category": the main feeling of the phrase, one of "Love", "Faith", "Hope", "Gratitude" or "Strength".
2. "message": the generated phrase.

Keep the phrase direct and poetic, and no longer than 15 words.

Example output:

{
"category": "Strength",
"message": "Your inner light can guide the whole universe; shine with that strength today!"
}"#;

/// Trait for text generation backends
#[async_trait]
pub trait PhraseGenerator: Send + Sync {
    /// Send `prompt` and return the generated text, `None` when the service
    /// answered without any text content.
    async fn generate(&self, prompt: &str) -> Result<Option<String>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.text.filter(|text| !text.trim().is_empty()))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Extract a readable message from an error response body
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        return match parsed.error.status {
            Some(code) => format!("{}: {}", code, parsed.error.message),
            None => parsed.error.message,
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// Client for the Gemini `generateContent` REST endpoint
pub struct GeminiClient {
    http_client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PhraseError::config(
                "Gemini API key is required (set GEMINI_API_KEY)",
            ));
        }

        let network = NetworkConfig {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            ..NetworkConfig::default()
        };

        Ok(Self {
            http_client: create_http_client(&network)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl PhraseGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        debug!(model = %self.model, "Requesting phrase from generation service");

        let response = self
            .http_client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_network_error(&e, SERVICE_NAME))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PhraseError::generation(
                status.as_u16(),
                error_message(&text, status),
            ));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| classify_network_error(&e, SERVICE_NAME))?;

        Ok(payload.first_text())
    }
}
