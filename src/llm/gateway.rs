// src/llm/gateway.rs
// Unified text-generation entry point. Every AI-assisted feature calls
// generate(); its failure never propagates - the contract is text or
// nothing, and "nothing" is a first-class outcome every caller handles.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::llm::provider::TextProvider;
use crate::llm::registry::ProviderRegistry;

pub struct ProviderGateway {
    registry: ProviderRegistry,
    race_timeout: Duration,
    provider_timeout: Duration,
}

impl ProviderGateway {
    pub fn new(registry: ProviderRegistry, race_timeout: Duration, provider_timeout: Duration) -> Self {
        Self {
            registry,
            race_timeout,
            provider_timeout,
        }
    }

    /// True when at least one backend is configured. Callers use this to
    /// skip prompt construction entirely when nothing could answer.
    pub fn has_providers(&self) -> bool {
        !self.registry.is_empty()
    }

    /// Generate text for a prompt, or nothing.
    ///
    /// Policy: priority chain one at a time, then the designated pair
    /// raced concurrently under a shared deadline (first usable result
    /// wins, the loser is abandoned), then the remainder sequentially.
    /// `context` tags the failure event when everything is exhausted.
    pub async fn generate(&self, context: &str, prompt: &str, temperature: f32) -> Option<String> {
        // 1. Priority chain, short-circuit on first success.
        for provider in &self.registry.priority {
            if let Some(text) = self.try_one(provider, prompt, temperature).await {
                info!(context, provider = provider.name(), "priority provider succeeded");
                return Some(text);
            }
        }

        // 2. Bounded two-way race.
        if let Some(text) = self.race(prompt, temperature).await {
            info!(context, "race produced a result");
            return Some(text);
        }

        // 3. Remaining lower-priority backends, sequentially. Each
        // provider handles its own retry/backoff and key fallback.
        for provider in &self.registry.remainder {
            if let Some(text) = self.try_one(provider, prompt, temperature).await {
                info!(context, provider = provider.name(), "fallback provider succeeded");
                return Some(text);
            }
        }

        self.log_exhaustion(context);
        None
    }

    async fn try_one(
        &self,
        provider: &Arc<dyn TextProvider>,
        prompt: &str,
        temperature: f32,
    ) -> Option<String> {
        match tokio::time::timeout(self.provider_timeout, provider.complete(prompt, temperature))
            .await
        {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                warn!(provider = provider.name(), "provider failed: {e}");
                None
            }
            Err(_) => {
                warn!(
                    provider = provider.name(),
                    "provider timed out after {:?}", self.provider_timeout
                );
                None
            }
        }
    }

    /// Run the designated racers concurrently; take the first success
    /// within the window. Losers are abandoned, not cancelled mid-flight
    /// - their results are simply discarded.
    async fn race(&self, prompt: &str, temperature: f32) -> Option<String> {
        if self.registry.racers.is_empty() {
            return None;
        }

        let mut attempts = JoinSet::new();
        for provider in &self.registry.racers {
            let provider = Arc::clone(provider);
            let prompt = prompt.to_string();
            attempts.spawn(async move {
                let result = provider.complete(&prompt, temperature).await;
                (provider.name(), result)
            });
        }

        let deadline = tokio::time::sleep(self.race_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!("race timed out after {:?}", self.race_timeout);
                    attempts.abort_all();
                    return None;
                }
                joined = attempts.join_next() => {
                    match joined {
                        Some(Ok((name, Ok(text)))) => {
                            info!(winner = name, "race winner");
                            attempts.abort_all();
                            return Some(text);
                        }
                        Some(Ok((name, Err(e)))) => {
                            warn!(provider = name, "racer failed: {e}");
                        }
                        Some(Err(_)) => {} // racer task aborted/panicked
                        None => return None, // all racers done, no winner
                    }
                }
            }
        }
    }

    /// Structured failure event: total exhaustion of every backend.
    fn log_exhaustion(&self, context: &str) {
        warn!(
            context,
            timestamp = %Utc::now().to_rfc3339(),
            configured = ?self.registry.configured_names(),
            "all text-generation backends exhausted"
        );
    }
}
