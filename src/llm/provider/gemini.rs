// src/llm/provider/gemini.rs
// Google Gemini REST provider (generateContent endpoint).

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::{status_error, ProviderError, TextProvider};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const INITIAL_BACKOFF_MS: u64 = 500;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    fallback_api_key: Option<String>,
    model: String,
    max_retries: u32,
    max_tokens: u32,
    request_timeout: Duration,
}

impl GeminiProvider {
    pub fn new(
        api_key: String,
        fallback_api_key: Option<String>,
        model: String,
        max_retries: u32,
        max_tokens: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            fallback_api_key,
            model,
            max_retries,
            max_tokens,
            request_timeout,
        }
    }

    async fn request_once(
        &self,
        prompt: &str,
        temperature: f32,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, api_key
        );
        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        parsed
            .candidates
            .and_then(|mut c| c.drain(..).next())
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts)
            .and_then(|mut parts| parts.drain(..).next())
            .and_then(|part| part.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed("no candidate text in response".into()))
    }

    /// Bounded retry with exponential backoff + jitter for one key.
    /// Only rate limits and 5xx errors retry; anything else aborts.
    async fn attempt_key(
        &self,
        prompt: &str,
        temperature: f32,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        let mut delay = Duration::from_millis(INITIAL_BACKOFF_MS);

        for attempt in 1..=self.max_retries {
            match self.request_once(prompt, temperature, api_key).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let jitter = Duration::from_millis(rand::rng().random_range(0..250));
                    warn!(
                        provider = "gemini",
                        attempt,
                        "transient error ({e}), retrying in {:?}",
                        delay + jitter
                    );
                    tokio::time::sleep(delay + jitter).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
        Err(ProviderError::RateLimited)
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    // Explicit two-state credential machine: primary exhausts its
    // retries on rate limits, then the fallback key gets one pass.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError> {
        match self.attempt_key(prompt, temperature, &self.api_key).await {
            Ok(text) => Ok(text),
            Err(e) if e.is_rate_limit() => {
                if let Some(fallback) = &self.fallback_api_key {
                    warn!(provider = "gemini", "primary key exhausted, trying fallback key");
                    self.attempt_key(prompt, temperature, fallback).await
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }
}
