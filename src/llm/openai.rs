//! OpenAI-compatible chat completions client
//!
//! Talks to any endpoint exposing `POST {base}/chat/completions` (SiliconFlow
//! hosting DeepSeek V3 by default). Uses a long-lived reqwest::Client for
//! connection pooling.

use crate::config::AppConfig;
use crate::error::ChatError;
use crate::llm::{ChatModel, CompletionRequest};
use crate::models::ChatTurn;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Reusable completions client (connection-pooled)
pub struct OpenAiCompatibleClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Option<Duration>) -> Self {
        let mut builder = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().unwrap_or_else(|e| {
            error!("Failed to build tuned HTTP client, using defaults: {}", e);
            Client::new()
        });

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.api_key.clone(),
            config.api_url.clone(),
            config.model.clone(),
            config.request_timeout,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(ChatError::Config(
                "SILICON_FLOW_API_KEY not configured".to_string(),
            ));
        }

        let body = CompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.params.temperature,
            max_tokens: request.params.max_tokens,
            stop: request.params.stop.as_deref(),
        };

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            "Calling chat completions endpoint"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Chat completion request failed: {}", e);
                ChatError::Upstream(format!("API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Chat completion error response ({}): {}", status, error_text);
            return Err(ChatError::Upstream(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat completion response: {}", e);
            ChatError::MalformedResponse(format!("parse error: {}", e))
        })?;

        extract_reply(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// First choice's content. A null content is an empty reply, not an error.
fn extract_reply(response: CompletionResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ChatError::MalformedResponse("response contained no choices".to_string()))?;

    Ok(choice.message.content.unwrap_or_default())
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
