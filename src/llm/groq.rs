//! Groq chat provider (OpenAI-compatible chat completions API).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ChatProvider, ChatRequest};

/// Blocking client for Groq's `/chat/completions` endpoint. Any
/// OpenAI-compatible endpoint works through the `base_url` override.
pub struct GroqProvider {
    api_key: String,
    endpoint: String,
    model: String,
    client: Client,
}

impl GroqProvider {
    /// Builds a provider for the given credential, base URL, and model.
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Groq API key");
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build Groq HTTP client")?;
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Ok(Self {
            api_key,
            endpoint,
            model,
            client,
        })
    }
}

impl ChatProvider for GroqProvider {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid Groq API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = CompletionRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![Message {
                role: "user",
                content: request.prompt,
            }],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .context("failed to call Groq chat completions")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("Groq returned {}: {}", status, text);
        }
        let parsed: CompletionResponse = resp.json().context("failed to parse Groq response")?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        if answer.is_empty() {
            bail!("Groq response contained no message content");
        }
        Ok(answer)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}
