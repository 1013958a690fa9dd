//! Google Gemini provider over the `generateContent` REST API.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{with_native_trace, TextProvider};
use crate::config::PipelineConfig;
use crate::error::ProviderError;
use crate::parser;
use crate::prompt;
use crate::types::TransformOutput;

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini API client implementing [`TextProvider`].
pub struct GeminiProvider {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("endpoint", &self.endpoint)
            .field("has_api_key", &self.is_configured())
            .finish()
    }
}

impl GeminiProvider {
    /// Create a provider for the public Gemini endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            api_key: SecretString::from(api_key.into()),
        }
    }

    /// Use a custom proxy or enterprise endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Reuse an existing HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }

    async fn send(
        &self,
        model: &str,
        body: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let resp = self
            .client
            .post(self.url(model))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(self.endpoint.clone(), e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &text));
        }

        resp.json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    async fn validate(&self, model: &str) -> bool {
        if !self.is_configured() {
            warn!(model, "Gemini validation skipped: no API key configured");
            return false;
        }

        let body = GenerateContentRequest {
            contents: vec![Content::user("ping")],
            system_instruction: None,
            generation_config: GenerationConfig {
                temperature: None,
                max_output_tokens: Some(1),
                thinking_config: None,
            },
        };

        match self.send(model, &body).await {
            Ok(_) => true,
            Err(e) => {
                warn!(model, error = %e, "Gemini connection validation failed");
                false
            }
        }
    }

    async fn transform(
        &self,
        input: &str,
        config: &PipelineConfig,
    ) -> Result<TransformOutput, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::NotInitialized);
        }

        let prompt = prompt::render(&config.prompt_template, input);
        let body = build_request(&prompt, config);
        let response = self.send(&config.model, &body).await?;
        let reply = response.into_reply()?;

        debug!(
            model = %config.model,
            chars = reply.text.len(),
            has_thoughts = reply.thoughts.is_some(),
            "Gemini response received"
        );

        let parsed = parser::parse_response(&reply.text, config.use_native_thinking);
        Ok(with_native_trace(
            parsed,
            reply.thoughts,
            config.use_native_thinking,
        ))
    }
}

fn build_request<'a>(prompt: &'a str, config: &'a PipelineConfig) -> GenerateContentRequest<'a> {
    let thinking_config = config.use_native_thinking.then(|| ThinkingConfig {
        thinking_budget: config.effective_thinking_budget(),
        include_thoughts: true,
    });

    let system_instruction = (!config.system_instruction.trim().is_empty()).then(|| {
        SystemInstruction {
            parts: vec![Part {
                text: &config.system_instruction,
            }],
        }
    });

    GenerateContentRequest {
        contents: vec![Content::user(prompt)],
        system_instruction,
        generation_config: GenerationConfig {
            temperature: Some(config.temperature),
            max_output_tokens: None,
            thinking_config,
        },
    }
}

// -- Wire types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn user(text: &'a str) -> Self {
        Self {
            role: "user",
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
    include_thoughts: bool,
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
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

/// Answer text and thought summaries of the first candidate.
struct Reply {
    text: String,
    thoughts: Option<String>,
}

impl GenerateContentResponse {
    fn into_reply(self) -> Result<Reply, ProviderError> {
        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("no candidates returned (prompt may be blocked)".into())
        })?;

        let mut text = String::new();
        let mut thoughts = String::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            let Some(chunk) = part.text else { continue };
            if part.thought {
                thoughts.push_str(&chunk);
            } else {
                text.push_str(&chunk);
            }
        }

        Ok(Reply {
            text,
            thoughts: (!thoughts.is_empty()).then_some(thoughts),
        })
    }
}
