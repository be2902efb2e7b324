// src/llm/provider/mod.rs
// Provider trait and error taxonomy for multi-provider support.

use async_trait::async_trait;
use thiserror::Error;

pub mod gemini;
pub mod openai_compat;

/// One attempt against one backend either yields text or one of these.
/// Only `RateLimited` and 5xx `Api` errors are worth retrying; the rest
/// abandon the provider for this call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited")]
    RateLimited,
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Transient errors get retried with backoff inside a single
    /// provider attempt. Auth failures and malformed responses do not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::Network(e) => e.is_timeout() || e.is_connect(),
            ProviderError::Malformed(_) => false,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited)
    }
}

/// Universal text-generation backend interface. The gateway is written
/// against this capability, not any one vendor.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider name for logging/identification
    fn name(&self) -> &'static str;

    /// Single completion: prompt in, text out. Temperature is
    /// passthrough; each call site picks its own.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError>;
}

/// Map an HTTP status to the right error variant.
pub(crate) fn status_error(status: u16, message: String) -> ProviderError {
    if status == 429 {
        ProviderError::RateLimited
    } else {
        ProviderError::Api { status, message }
    }
}
