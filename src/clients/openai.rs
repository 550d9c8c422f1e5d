use crate::clients::traits::{ChatMessage, LlmClient, ModelParams, TransportError};
use crate::config::LlmConfig;
use crate::error::{Result, WeaverError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Client for any OpenAI-compatible `/chat/completions` endpoint (OpenAI, OpenRouter, local servers)
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    endpoint: String,
    api_key: Option<String>,
    timeout_ms: u64,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| WeaverError::Config {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint: chat_endpoint(&config.base_url),
            api_key: config.api_key.clone(),
            timeout_ms: config.timeout_ms,
            client,
        })
    }
}

/// Normalize a provider base URL to its chat-completions endpoint
fn chat_endpoint(base_url: &str) -> String {
    if base_url.ends_with("/chat/completions") {
        base_url.to_string()
    } else {
        format!("{}/chat/completions", base_url.trim_end_matches('/'))
    }
}

fn extract_content(response: ChatResponse) -> std::result::Result<String, TransportError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(TransportError::EmptyResponse)
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &ModelParams,
    ) -> std::result::Result<String, TransportError> {
        let body = ChatRequest {
            model: &params.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_output_tokens,
        };

        debug!(
            "Sending chat completion (model={}, messages={}, max_tokens={})",
            params.model,
            messages.len(),
            params.max_output_tokens
        );

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                TransportError::Http(e.to_string())
            }
        })?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        extract_content(parsed)
    }
}
