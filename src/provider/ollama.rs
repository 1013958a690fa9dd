//! Local Ollama provider over `/api/chat`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{with_native_trace, TextProvider};
use crate::config::PipelineConfig;
use crate::error::ProviderError;
use crate::parser;
use crate::prompt;
use crate::types::TransformOutput;

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Ollama client implementing [`TextProvider`].
///
/// Ollama needs no credentials, so it is always considered configured.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_ENDPOINT)
    }
}

impl OllamaProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Reuse an existing HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.endpoint, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(url.clone(), e.to_string()))?;

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
impl TextProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn validate(&self, model: &str) -> bool {
        match self.post("/api/show", &json!({ "model": model })).await {
            Ok(_) => true,
            Err(e) => {
                warn!(model, error = %e, "Ollama model check failed");
                false
            }
        }
    }

    async fn transform(
        &self,
        input: &str,
        config: &PipelineConfig,
    ) -> Result<TransformOutput, ProviderError> {
        let prompt = prompt::render(&config.prompt_template, input);
        let body = chat_body(&prompt, config);
        let response = self.post("/api/chat", &body).await?;
        let (content, thinking) = read_message(&response)?;

        debug!(
            model = %config.model,
            chars = content.len(),
            has_thinking = thinking.is_some(),
            "Ollama response received"
        );

        let parsed = parser::parse_response(&content, config.use_native_thinking);
        Ok(with_native_trace(parsed, thinking, config.use_native_thinking))
    }
}

fn chat_body(prompt: &str, config: &PipelineConfig) -> Value {
    let mut messages = vec![];
    if !config.system_instruction.trim().is_empty() {
        messages.push(json!({"role": "system", "content": config.system_instruction}));
    }
    messages.push(json!({"role": "user", "content": prompt}));

    let mut body = json!({
        "model": config.model,
        "messages": messages,
        "stream": false,
        "options": {
            "temperature": config.temperature,
        },
    });

    if config.use_native_thinking {
        body["think"] = json!(true);
    }

    body
}

fn read_message(response: &Value) -> Result<(String, Option<String>), ProviderError> {
    let message = response
        .get("message")
        .ok_or_else(|| ProviderError::InvalidResponse("missing 'message' field".to_string()))?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let thinking = message
        .get("thinking")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok((content, thinking))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_body_with_system_prompt() {
        let config = PipelineConfig::builder()
            .with_model("llama3.2")
            .with_system_instruction("sys")
            .with_temperature(0.5)
            .build();
        let body = chat_body("user text", &config);

        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user text");
        assert_eq!(body["options"]["temperature"], 0.5);
        assert!(body.get("think").is_none());
    }

    #[test]
    fn test_chat_body_native_thinking_without_system() {
        let config = PipelineConfig::builder()
            .with_system_instruction("")
            .with_native_thinking(true, 512)
            .build();
        let body = chat_body("x", &config);

        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["think"], true);
    }

    #[test]
    fn test_read_message() {
        let response = json!({
            "message": {"role": "assistant", "content": "done", "thinking": "hmm"}
        });
        let (content, thinking) = read_message(&response).unwrap();
        assert_eq!(content, "done");
        assert_eq!(thinking.as_deref(), Some("hmm"));
    }

    #[test]
    fn test_read_message_missing() {
        let result = read_message(&json!({"error": "model not found"}));
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_endpoint_normalized() {
        let provider = OllamaProvider::new("http://gpu-box:11434/");
        assert_eq!(provider.endpoint, "http://gpu-box:11434");
        assert!(provider.is_configured());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Port 9 (discard) is almost never served over HTTP locally.
        let provider = OllamaProvider::new("http://127.0.0.1:9");
        let result = provider.transform("hi", &PipelineConfig::default()).await;
        assert!(matches!(result, Err(ProviderError::Connection(..))));
        assert!(!provider.validate("llama3").await);
    }
}
