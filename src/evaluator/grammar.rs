// src/evaluator/grammar.rs
// Grammar-check collaborator. Best-effort: unavailability or any error
// yields an empty issue list, never a failure.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Reported issues are capped; nobody needs 40 comma nits per answer.
pub const GRAMMAR_ISSUE_CAP: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct GrammarIssue {
    pub message: String,
    pub suggestion: Option<String>,
    pub context: String,
}

#[async_trait]
pub trait GrammarChecker: Send + Sync {
    /// Check a text; empty result on unavailability.
    async fn check(&self, text: &str) -> Vec<GrammarIssue>;
}

/// No-op checker used when grammar checking is disabled.
pub struct DisabledGrammarChecker;

#[async_trait]
impl GrammarChecker for DisabledGrammarChecker {
    async fn check(&self, _text: &str) -> Vec<GrammarIssue> {
        Vec::new()
    }
}

// ── LanguageTool HTTP client ────────────────────────────────────────────

#[derive(Deserialize)]
struct LtResponse {
    matches: Option<Vec<LtMatch>>,
}

#[derive(Deserialize)]
struct LtMatch {
    message: String,
    replacements: Option<Vec<LtReplacement>>,
    context: Option<LtContext>,
}

#[derive(Deserialize)]
struct LtReplacement {
    value: String,
}

#[derive(Deserialize)]
struct LtContext {
    text: String,
}

pub struct LanguageToolChecker {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl LanguageToolChecker {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            timeout,
        }
    }

    async fn check_inner(&self, text: &str) -> Result<Vec<GrammarIssue>, reqwest::Error> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .form(&[("text", text), ("language", "en-US")])
            .send()
            .await?
            .error_for_status()?;

        let parsed: LtResponse = response.json().await?;
        let issues = parsed
            .matches
            .unwrap_or_default()
            .into_iter()
            .take(GRAMMAR_ISSUE_CAP)
            .map(|m| GrammarIssue {
                message: m.message,
                suggestion: m
                    .replacements
                    .and_then(|mut r| (!r.is_empty()).then(|| r.remove(0).value)),
                context: m.context.map(|c| c.text).unwrap_or_default(),
            })
            .collect();
        Ok(issues)
    }
}

#[async_trait]
impl GrammarChecker for LanguageToolChecker {
    async fn check(&self, text: &str) -> Vec<GrammarIssue> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        match self.check_inner(text).await {
            Ok(issues) => issues,
            Err(e) => {
                warn!("grammar check unavailable: {e}");
                Vec::new()
            }
        }
    }
}
