//! OpenAI-compatible chat completions client used as the `Generator`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use ragfuse_core::config::LlmConfig;
use ragfuse_core::error::Error;
use ragfuse_core::traits::Generator;

#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
    max_retries: usize,
}

impl OpenAiGenerator {
    /// The key comes from `cfg.api_key`, else `OPENAI_API_KEY`; local servers may run without one.
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        anyhow::ensure!(!cfg.model.trim().is_empty(), "missing LLM model name");
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = cfg.api_key.clone().or_else(|| std::env::var("OPENAI_API_KEY").ok()).filter(|k| !k.trim().is_empty());
        if let Some(key) = key {
            let auth = format!("Bearer {}", key.trim());
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth).context("invalid LLM API key")?);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .context("failed to build LLM HTTP client")?;
        let endpoint = format!("{}/chat/completions", cfg.base_url.trim_end_matches('/'));
        Ok(Self { client, endpoint, model: cfg.model.clone(), temperature: cfg.temperature, max_retries: cfg.max_retries.max(1) })
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0usize;
        loop {
            let request = ChatRequest {
                model: &self.model,
                temperature: self.temperature,
                messages: vec![ChatMessage { role: "user", content: prompt }],
            };
            match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: ChatResponse = resp.json().await.context("failed to parse chat completion response")?;
                        let Some(choice) = parsed.choices.into_iter().next() else {
                            anyhow::bail!("chat completion returned no choices");
                        };
                        let answer = choice.message.content.unwrap_or_default();
                        anyhow::ensure!(!answer.trim().is_empty(), "chat completion returned empty content");
                        debug!(chars = answer.len(), attempt, "chat completion received");
                        return Ok(answer);
                    }
                    let body = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(%status, attempt, "chat completion failed; retrying");
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    anyhow::bail!("chat completion request failed ({}): {}", status, body);
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(error = %err, attempt, "chat completion error; retrying");
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn complete(&self, prompt: &str) -> ragfuse_core::Result<String> {
        self.chat(prompt).await.map_err(|e| Error::GenerationFailure(format!("{:#}", e)))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
