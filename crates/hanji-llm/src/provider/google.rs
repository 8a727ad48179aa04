//! Google Gemini reply backend
//!
//! Sends a persona prompt plus the user's message to
//! `POST {endpoint}/models/{model}:generateContent?key=...` and returns the
//! first text part of the first candidate.

use std::time::Duration;

use async_trait::async_trait;
use hanji_core::ReplyGenerator;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::LlmError;

/// Reply used when no API key is configured
pub const AI_UNAVAILABLE_REPLY: &str = "憨吉的 AI 腦袋還沒接上電源，汪！";

/// Reply used when the backend call fails or returns nothing usable
pub const NOT_UNDERSTOOD_REPLY: &str = "憨吉聽不懂你在說什麼，汪？";

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const PERSONA_INSTRUCTION: &str = "你是一隻名叫「憨吉」的狗狗，個性憨厚、黏人又貪吃。\
請用繁體中文、以狗狗的口吻簡短回覆主人的訊息（不超過五十個字），\
可以適度加上「汪」之類的語助詞。";

/// Gemini configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// API key; `None` degrades every request to [`AI_UNAVAILABLE_REPLY`]
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub max_output_tokens: Option<u32>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            temperature: default_temperature(),
            max_output_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini-backed reply generator
pub struct GoogleProvider {
    config: GoogleConfig,
    client: reqwest::Client,
}

impl GoogleProvider {
    /// Create a provider; a missing API key is allowed
    pub fn create(config: GoogleConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        if config.api_key.is_none() {
            warn!("Gemini API key not configured, AI replies will use the fallback text");
        }

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Full prompt sent for a user message
    pub fn build_prompt(text: &str) -> String {
        format!("{}\n\n主人說：{}", PERSONA_INSTRUCTION, text)
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Call the API and extract the first candidate's text
    pub async fn complete(&self, text: &str) -> Result<String, LlmError> {
        let api_key = self.api_key().ok_or(LlmError::MissingApiKey)?;

        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: Self::build_prompt(text),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        debug!("Sending generateContent request to model {}", self.config.model);

        let response = self
            .client
            .post(self.generate_url())
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("no candidate text in response".to_string()))
    }
}

#[async_trait]
impl ReplyGenerator for GoogleProvider {
    async fn generate(&self, text: &str) -> String {
        match self.complete(text).await {
            Ok(reply) => reply,
            Err(LlmError::MissingApiKey) => {
                warn!("Gemini API key missing, skipping AI reply");
                AI_UNAVAILABLE_REPLY.to_string()
            }
            Err(e) => {
                error!("Gemini reply generation failed: {}", e);
                NOT_UNDERSTOOD_REPLY.to_string()
            }
        }
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
