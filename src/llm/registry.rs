// src/llm/registry.rs
// ProviderRegistry: which backends exist and where they sit in the
// gateway's policy. Built once at startup from config, then injected -
// no global availability flags.

use std::sync::Arc;
use std::time::Duration;

use crate::config::CoachConfig;
use crate::llm::provider::gemini::GeminiProvider;
use crate::llm::provider::openai_compat::OpenAiCompatProvider;
use crate::llm::provider::TextProvider;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const CEREBRAS_BASE_URL: &str = "https://api.cerebras.ai/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";

/// Ordered provider sets for the gateway policy:
/// `priority` tried first one at a time, then `racers` concurrently,
/// then `remainder` sequentially.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    pub priority: Vec<Arc<dyn TextProvider>>,
    pub racers: Vec<Arc<dyn TextProvider>>,
    pub remainder: Vec<Arc<dyn TextProvider>>,
}

impl ProviderRegistry {
    pub fn new(
        priority: Vec<Arc<dyn TextProvider>>,
        racers: Vec<Arc<dyn TextProvider>>,
        remainder: Vec<Arc<dyn TextProvider>>,
    ) -> Self {
        Self {
            priority,
            racers,
            remainder,
        }
    }

    /// Assemble the full chain from configuration. Providers without an
    /// API key are simply absent; an empty registry is a valid state
    /// that puts every caller on its deterministic fallback path.
    pub fn from_config(config: &CoachConfig) -> Self {
        let timeout = Duration::from_secs(config.provider_timeout_secs);
        let retries = config.provider_max_retries;
        let max_tokens = config.max_output_tokens;

        let mut priority: Vec<Arc<dyn TextProvider>> = Vec::new();
        let mut racers: Vec<Arc<dyn TextProvider>> = Vec::new();
        let mut remainder: Vec<Arc<dyn TextProvider>> = Vec::new();

        // Fastest/cheapest first.
        if let Some(key) = &config.groq_api_key {
            priority.push(Arc::new(OpenAiCompatProvider::new(
                "groq",
                GROQ_BASE_URL,
                key.clone(),
                vec![config.groq_model.clone()],
                retries,
                max_tokens,
                timeout,
            )));
        }
        if let Some(key) = &config.cerebras_api_key {
            priority.push(Arc::new(OpenAiCompatProvider::new(
                "cerebras",
                CEREBRAS_BASE_URL,
                key.clone(),
                vec![config.cerebras_model.clone()],
                retries,
                max_tokens,
                timeout,
            )));
        }

        // The two backends raced when the priority chain comes up empty.
        if let Some(key) = &config.gemini_api_key {
            racers.push(Arc::new(GeminiProvider::new(
                key.clone(),
                config.gemini_api_key_fallback.clone(),
                config.gemini_model.clone(),
                retries,
                max_tokens,
                timeout,
            )));
        }
        if let Some(key) = &config.openrouter_api_key {
            racers.push(Arc::new(
                OpenAiCompatProvider::new(
                    "openrouter",
                    OPENROUTER_BASE_URL,
                    key.clone(),
                    CoachConfig::model_list(&config.openrouter_models),
                    retries,
                    max_tokens,
                    timeout,
                )
                .with_fallback_key(config.openrouter_api_key_fallback.clone())
                .with_header("HTTP-Referer", format!("http://{}", config.bind_address()))
                .with_header("X-Title", "InterviewIQ".to_string()),
            ));
        }

        // Last-resort paid tiers.
        if let Some(key) = &config.openai_api_key {
            remainder.push(Arc::new(OpenAiCompatProvider::new(
                "openai",
                OPENAI_BASE_URL,
                key.clone(),
                CoachConfig::model_list(&config.openai_models),
                retries,
                max_tokens,
                timeout,
            )));
        }
        if let Some(key) = &config.perplexity_api_key {
            remainder.push(Arc::new(OpenAiCompatProvider::new(
                "perplexity",
                PERPLEXITY_BASE_URL,
                key.clone(),
                CoachConfig::model_list(&config.perplexity_models),
                retries,
                max_tokens,
                timeout,
            )));
        }

        Self {
            priority,
            racers,
            remainder,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.racers.is_empty() && self.remainder.is_empty()
    }

    /// Name snapshot for structured failure logging.
    pub fn configured_names(&self) -> Vec<&'static str> {
        self.priority
            .iter()
            .chain(self.racers.iter())
            .chain(self.remainder.iter())
            .map(|p| p.name())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = ProviderRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.configured_names().is_empty());
    }
}
