// src/llm/provider/openai_compat.rs
// Chat-completions provider for every backend speaking the OpenAI wire
// shape: Groq, Cerebras, OpenRouter, OpenAI, Perplexity.

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{status_error, ProviderError, TextProvider};

const INITIAL_BACKOFF_MS: u64 = 500;
const BACKOFF_MULTIPLIER: u32 = 2;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Credential state for the two-tier key fallback: primary first, then
/// the secondary key once the primary exhausts its rate-limit retries.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Credential {
    Primary,
    Secondary,
}

pub struct OpenAiCompatProvider {
    name: &'static str,
    client: Client,
    base_url: String,
    api_key: String,
    fallback_api_key: Option<String>,
    /// Ordered model list; tried in sequence within one call.
    models: Vec<String>,
    extra_headers: Vec<(&'static str, String)>,
    max_retries: u32,
    max_tokens: u32,
    request_timeout: Duration,
}

impl OpenAiCompatProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &'static str,
        base_url: impl Into<String>,
        api_key: String,
        models: Vec<String>,
        max_retries: u32,
        max_tokens: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            name,
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            fallback_api_key: None,
            models,
            extra_headers: Vec::new(),
            max_retries,
            max_tokens,
            request_timeout,
        }
    }

    pub fn with_fallback_key(mut self, key: Option<String>) -> Self {
        self.fallback_api_key = key;
        self
    }

    /// OpenRouter wants attribution headers on every request.
    pub fn with_header(mut self, name: &'static str, value: String) -> Self {
        self.extra_headers.push((name, value));
        self
    }

    fn key_for(&self, credential: Credential) -> &str {
        match credential {
            Credential::Primary => &self.api_key,
            Credential::Secondary => self
                .fallback_api_key
                .as_deref()
                .unwrap_or(&self.api_key),
        }
    }

    async fn request_once(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        credential: Credential,
    ) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.key_for(credential))
            .timeout(self.request_timeout)
            .json(&body);
        for (header, value) in &self.extra_headers {
            request = request.header(*header, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error.message.unwrap_or_default(),
            });
        }

        parsed
            .choices
            .and_then(|mut choices| choices.drain(..).next())
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed("no message content in response".into()))
    }

    /// One model with bounded exponential backoff on transient errors.
    async fn attempt_model(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        credential: Credential,
    ) -> Result<String, ProviderError> {
        let mut delay = Duration::from_millis(INITIAL_BACKOFF_MS);

        for attempt in 1..=self.max_retries {
            match self.request_once(model, prompt, temperature, credential).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let jitter = Duration::from_millis(rand::rng().random_range(0..250));
                    warn!(
                        provider = self.name,
                        model,
                        attempt,
                        "transient error ({e}), retrying in {:?}",
                        delay + jitter
                    );
                    tokio::time::sleep(delay + jitter).await;
                    delay *= BACKOFF_MULTIPLIER;
                }
                Err(e) => return Err(e),
            }
        }
        Err(ProviderError::RateLimited)
    }

    /// Try every configured model in order under one credential.
    async fn try_models(
        &self,
        prompt: &str,
        temperature: f32,
        credential: Credential,
    ) -> Result<String, ProviderError> {
        let mut last_error = ProviderError::Malformed("no models configured".into());

        for model in &self.models {
            debug!(provider = self.name, model, ?credential, "trying model");
            match self.attempt_model(model, prompt, temperature, credential).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(provider = self.name, model, "model failed: {e}");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

#[async_trait]
impl TextProvider for OpenAiCompatProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError> {
        match self.try_models(prompt, temperature, Credential::Primary).await {
            Ok(text) => Ok(text),
            Err(e) if e.is_rate_limit() && self.fallback_api_key.is_some() => {
                warn!(
                    provider = self.name,
                    "primary credential rate limited, switching to fallback key"
                );
                self.try_models(prompt, temperature, Credential::Secondary).await
            }
            Err(e) => Err(e),
        }
    }
}
