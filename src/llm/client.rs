use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::ChatModel;
use super::error::LlmError;
use super::types::{Message, MessagesRequest, MessagesResponse};

const API_URL: &str = "https://api.anthropic.com/v1/messages";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

pub struct AnthropicClient {
    api_key: String,
    model: String,
    client: Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, model, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(Self {
            api_key,
            model,
            client,
            base_url,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn send_message(&self, req: &MessagesRequest) -> Result<MessagesResponse, LlmError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(LlmError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<MessagesResponse>().await?;
        Ok(body)
    }
}

/// Split role="system" messages into the top-level system prompt the Messages API expects.
fn build_request(
    model: &str,
    messages: &[Message],
    temperature: f32,
    max_tokens: u32,
) -> MessagesRequest {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.is_system())
        .map(|m| m.content.as_str())
        .collect();
    MessagesRequest {
        model: model.to_string(),
        max_tokens,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        temperature: Some(temperature),
        messages: messages.iter().filter(|m| !m.is_system()).cloned().collect(),
    }
}

impl ChatModel for AnthropicClient {
    async fn chat(
        &self,
        messages: &[Message],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let req = build_request(&self.model, messages, temperature, max_tokens);
        let response = self.send_message(&req).await?;
        debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "chat completed"
        );
        Ok(response.text())
    }
}
