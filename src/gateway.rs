//! OpenAI-compatible chat-completion gateway.
//!
//! The translation driver talks to the [`CompletionGateway`] trait so
//! tests can substitute scripted gateways; [`OpenAiGateway`] is the
//! production implementation over reqwest.

use crate::config::Config;
use crate::retry::{with_retry_if, RetryConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One turn of a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Gateway failures, split so the retry predicate can see HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("AI API error ({status}): {body}")]
    Status { status: reqwest::StatusCode, body: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Retry 429 and 5xx responses plus transport-level failures; other
/// client errors fail immediately.
fn is_retryable(error: &GatewayError) -> bool {
    match error {
        GatewayError::Status { status, .. } => {
            status.as_u16() == 429 || status.is_server_error()
        }
        GatewayError::Other(_) => true,
    }
}

/// A chat-completion backend able to answer with a full message, either
/// at once or as one streamed response read to the end.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Single non-streaming completion; returns the assistant content.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// One streaming completion; returns the concatenated deltas in
    /// arrival order. The text may be an incomplete answer when the
    /// model stopped early; continuation is the caller's concern.
    async fn stream_completion(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Production gateway for OpenAI-compatible chat-completion APIs.
pub struct OpenAiGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    organization: Option<String>,
    model: String,
    retry: RetryConfig,
}

impl OpenAiGateway {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        organization: Option<String>,
    ) -> Result<Self> {
        // The overall timeout is the defensive wall-clock bound on a
        // single completion call; generation can legitimately take minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            organization,
            model: model.to_string(),
            retry: RetryConfig::llm_call(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.ai_api_base_url,
            config.require_ai_api_key()?,
            &config.ai_api_model,
            config.ai_api_org.clone(),
        )
    }

    /// Override the retry policy (used by tests to avoid backoff delays).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response, GatewayError> {
        let request = ChatRequest { model: &self.model, messages, stream };
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        let response = builder
            .json(&request)
            .send()
            .await
            .context("Failed to send request to AI API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {e}>"));
            return Err(GatewayError::Status { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionGateway for OpenAiGateway {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let result = with_retry_if(
            &self.retry,
            "Chat completion",
            || async move {
                let response = self.send(messages, false).await?;
                let parsed: ChatResponse = response
                    .json()
                    .await
                    .context("Failed to parse AI API response")
                    .map_err(GatewayError::Other)?;
                Ok::<ChatResponse, GatewayError>(parsed)
            },
            is_retryable,
        )
        .await?;

        if let Some(usage) = &result.usage {
            debug!(
                "Completion used {} prompt + {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("AI API response contained no choices")
    }

    async fn stream_completion(&self, messages: &[ChatMessage]) -> Result<String> {
        let content = with_retry_if(
            &self.retry,
            "Chat completion (stream)",
            || async move {
                let response = self.send(messages, true).await?;
                read_streamed_content(response).await.map_err(GatewayError::Other)
            },
            is_retryable,
        )
        .await?;
        Ok(content)
    }
}

/// Drain an SSE response, concatenating `choices[0].delta.content` of
/// every `data:` event until `[DONE]` or end of stream.
async fn read_streamed_content(response: reqwest::Response) -> Result<String> {
    let mut stream = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();
    let mut content = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read stream chunk from AI API")?;
        buf.extend_from_slice(&chunk);

        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end();
            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();
            if payload == "[DONE]" {
                return Ok(content);
            }
            if payload.is_empty() {
                continue;
            }
            let parsed: StreamChunk = serde_json::from_str(payload)
                .with_context(|| format!("Failed to parse stream chunk: {payload}"))?;
            if let Some(delta) = parsed
                .choices
                .first()
                .and_then(|c| c.delta.content.as_deref())
            {
                content.push_str(delta);
            }
        }
    }

    Ok(content)
}
