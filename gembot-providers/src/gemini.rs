//! Gemini `generateContent` HTTP client

use async_trait::async_trait;
use gembot_core::config::ProviderConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::base::{LLMProvider, LLMResponse, Message, MessageRole, ProviderError, ProviderResult};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl From<&Message> for Content {
    fn from(message: &Message) -> Self {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Model => "model",
        };
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: Some(message.content.clone()),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i64,
    #[serde(default)]
    candidates_token_count: i64,
    #[serde(default)]
    total_token_count: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Gemini provider client
pub struct GeminiClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::ConfigError(
                "Gemini API key is required".to_string(),
            ));
        }

        let api_base = api_base
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            api_base,
            api_key,
            model: model.into(),
            max_tokens,
            temperature,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        Self::new(
            config.api_key.clone(),
            config.api_base.clone(),
            config.model.clone(),
            config.max_tokens,
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }

    fn build_request(&self, history: &[Message], message: &str) -> GenerateContentRequest {
        let mut contents: Vec<Content> = history.iter().map(Content::from).collect();
        contents.push(Content::from(&Message::user(message)));

        GenerateContentRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
                candidate_count: 1,
            },
        }
    }

    /// Parse a Gemini response into our standard format.
    ///
    /// A blocked prompt is an error; a candidate without text is an empty
    /// response.
    fn parse_response(response: GenerateContentResponse) -> ProviderResult<LLMResponse> {
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            warn!("Gemini blocked the prompt: {}", reason);
            return Err(ProviderError::ApiError(format!("prompt blocked: {}", reason)));
        }

        let mut usage = HashMap::new();
        if let Some(meta) = response.usage_metadata {
            usage.insert("prompt_tokens".to_string(), meta.prompt_token_count);
            usage.insert("completion_tokens".to_string(), meta.candidates_token_count);
            usage.insert("total_tokens".to_string(), meta.total_token_count);
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return Ok(LLMResponse {
                content: None,
                finish_reason: None,
                usage,
            });
        };

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content: if text.is_empty() { None } else { Some(text) },
            finish_reason: candidate.finish_reason,
            usage,
        })
    }

    fn api_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
        let detail = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) if !envelope.error.status.is_empty() => {
                format!("{} {}", envelope.error.status, envelope.error.message)
            }
            Ok(envelope) => envelope.error.message,
            Err(_) if body.trim().is_empty() => "empty body".to_string(),
            Err(_) => body.to_string(),
        };
        ProviderError::ApiError(format!("HTTP {}: {}", status, detail))
    }
}

#[async_trait]
impl LLMProvider for GeminiClient {
    async fn generate(&self, history: &[Message], message: &str) -> ProviderResult<LLMResponse> {
        let request = self.build_request(history, message);

        debug!(
            "Sending generateContent request with model {} ({} prior messages)",
            self.model,
            history.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Self::api_error(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("unexpected generateContent body: {}", e))
        })?;
        Self::parse_response(parsed)
    }

    fn default_model(&self) -> String {
        self.model.clone()
    }
}
