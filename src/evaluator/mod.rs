// src/evaluator/mod.rs
// Per-answer scoring: deterministic heuristics always run; an optional
// AI critique enriches the record when a backend answers.

pub mod grammar;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::heuristics;
use crate::llm::parse::parse_model_json;
use crate::llm::ProviderGateway;
use crate::metrics::{self, VoiceMetrics};
use grammar::GrammarChecker;

/// Reserved transcript value marking a deliberately unanswered question.
/// Existing clients send this exact string; an empty transcript is a real
/// (empty) answer, not a skip.
pub const SKIP_SENTINEL: &str = "[Question skipped - no answer provided]";

/// Critique temperature: moderate, for varied but grounded phrasing.
const CRITIQUE_TEMPERATURE: f32 = 0.7;

const MAX_STRENGTHS: usize = 3;
const MAX_WEAKNESSES: usize = 3;
const MAX_TIPS: usize = 2;
const MAX_RESOURCES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLink {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub topic: String,
}

/// Qualitative critique of one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub is_answer_correct: bool,
    pub correctness_feedback: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub feedback_text: String,
    pub improvement_tips: Vec<String>,
    pub recommended_resources: Vec<ResourceLink>,
}

/// Where the critique came from. Degraded results stay distinguishable
/// even if the presentation layer hides the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CritiqueSource {
    Ai,
    Fallback,
}

/// Scoring record for one submitted answer. Created once, never mutated
/// after evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub transcript: String,
    pub voice_metrics: VoiceMetrics,
    pub star_method_used: bool,
    pub star_component_score: u8,
    pub content_quality_score: u8,
    pub sentiment_score: f64,
    /// Bounded 0-5 speaking-smoothness proxy feeding the report's
    /// communication score.
    pub fluency_score: f64,
    pub grammar_errors: Vec<String>,
    pub critique: Critique,
    pub critique_source: CritiqueSource,
    /// Category tag inherited from the question (Technical, Behavioral,
    /// ...); empty when uncategorized.
    pub category: String,
}

impl AnswerRecord {
    pub fn grammar_issue_count(&self) -> usize {
        self.grammar_errors.len()
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }
}

// Shape the model is asked to return. Defaults keep a partially valid
// response usable instead of discarding it.
#[derive(Deserialize)]
struct CritiqueJson {
    #[serde(default = "default_true")]
    is_answer_correct: bool,
    #[serde(default)]
    correctness_feedback: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    feedback_text: String,
    #[serde(default)]
    improvement_tips: Vec<String>,
    #[serde(default)]
    recommended_resources: Vec<ResourceLink>,
}

fn default_true() -> bool {
    true
}

/// Deterministic sentiment rule (the scale the report expects): STAR
/// answers read as confident, others neutral.
fn sentiment_for(used_star: bool) -> f64 {
    if used_star {
        0.7
    } else {
        0.5
    }
}

pub struct ResponseEvaluator {
    gateway: Arc<ProviderGateway>,
    grammar: Arc<dyn GrammarChecker>,
}

impl ResponseEvaluator {
    pub fn new(gateway: Arc<ProviderGateway>, grammar: Arc<dyn GrammarChecker>) -> Self {
        Self { gateway, grammar }
    }

    /// Score one answer. Heuristics always run; the gateway only adds
    /// a critique on top. Never fails.
    pub async fn evaluate(
        &self,
        question_text: &str,
        transcript: &str,
        raw_metrics: Option<&Value>,
    ) -> AnswerRecord {
        let voice_metrics = metrics::normalize(raw_metrics, transcript);

        // Terminal case: the skip sentinel bypasses scoring and the
        // gateway entirely.
        if transcript == SKIP_SENTINEL {
            info!("question skipped, emitting fixed skip record");
            return skipped_record(transcript, voice_metrics);
        }

        let (star_method_used, star_component_score) = heuristics::detect_star(transcript);
        let content_quality_score = heuristics::content_quality(question_text, transcript);
        let fluency_score = metrics::fluency_signal(raw_metrics)
            .unwrap_or(star_component_score as f64);

        let grammar_errors: Vec<String> = self
            .grammar
            .check(transcript)
            .await
            .into_iter()
            .map(|issue| issue.message)
            .collect();

        let (critique, critique_source) = if self.gateway.has_providers() {
            match self
                .request_critique(question_text, transcript, &voice_metrics)
                .await
            {
                Some(critique) => (critique, CritiqueSource::Ai),
                None => (fallback_critique(), CritiqueSource::Fallback),
            }
        } else {
            (fallback_critique(), CritiqueSource::Fallback)
        };

        AnswerRecord {
            transcript: transcript.to_string(),
            voice_metrics,
            star_method_used,
            star_component_score,
            content_quality_score,
            sentiment_score: sentiment_for(star_method_used),
            fluency_score,
            grammar_errors,
            critique,
            critique_source,
            category: String::new(),
        }
    }

    async fn request_critique(
        &self,
        question_text: &str,
        transcript: &str,
        voice: &VoiceMetrics,
    ) -> Option<Critique> {
        let prompt = critique_prompt(question_text, transcript, voice);
        let raw = self
            .gateway
            .generate("response_analysis", &prompt, CRITIQUE_TEMPERATURE)
            .await?;

        let Some(parsed) = parse_model_json::<CritiqueJson>(&raw) else {
            warn!("critique response unparsable, falling back");
            return None;
        };

        Some(Critique {
            is_answer_correct: parsed.is_answer_correct,
            correctness_feedback: parsed.correctness_feedback,
            strengths: truncate(parsed.strengths, MAX_STRENGTHS),
            weaknesses: truncate(parsed.weaknesses, MAX_WEAKNESSES),
            feedback_text: parsed.feedback_text,
            improvement_tips: truncate(parsed.improvement_tips, MAX_TIPS),
            recommended_resources: {
                let mut resources = parsed.recommended_resources;
                resources.truncate(MAX_RESOURCES);
                resources
            },
        })
    }
}

fn truncate(mut items: Vec<String>, cap: usize) -> Vec<String> {
    items.truncate(cap);
    items
}

fn critique_prompt(question_text: &str, transcript: &str, voice: &VoiceMetrics) -> String {
    format!(
        r#"You are a SENIOR ENGINEERING MANAGER conducting a rigorous interview debrief.

**CONTEXT:**
- Question: "{question_text}"
- Candidate Answer: "{transcript}"
- Duration: {words} words
- Pace: {wpm} wpm (Normal: 120-150)
- Fillers: {fillers}

**YOUR TASK:**
Provide honest feedback. Quote exact phrases the candidate used. Identify
specific missing concepts. No fluff.

**OUTPUT JSON:**
{{
  "is_answer_correct": true,
  "correctness_feedback": "Direct correction of any technical errors.",
  "strengths": ["Quote a specific strong phrase"],
  "weaknesses": ["Quote a vague phrase and say what was missing"],
  "feedback_text": "2-3 sentences of direct advice.",
  "improvement_tips": ["Actionable tip 1", "Actionable tip 2"],
  "recommended_resources": [{{"title": "Title", "url": "https://...", "topic": "Topic"}}]
}}
Return ONLY valid JSON."#,
        words = voice.word_count,
        wpm = voice.words_per_minute,
        fillers = voice.total_fillers(),
    )
}

/// Deterministic minimal record when no backend answered.
fn fallback_critique() -> Critique {
    Critique {
        is_answer_correct: true,
        correctness_feedback: String::new(),
        strengths: vec!["Clear audio".to_string()],
        weaknesses: vec!["Analysis unavailable".to_string()],
        feedback_text: "AI service unavailable. Please check metrics.".to_string(),
        improvement_tips: vec!["Check connection".to_string()],
        recommended_resources: Vec::new(),
    }
}

/// Fixed record for a skipped question: encouragement, not a zero-content
/// evaluation.
fn skipped_record(transcript: &str, voice_metrics: VoiceMetrics) -> AnswerRecord {
    AnswerRecord {
        transcript: transcript.to_string(),
        voice_metrics,
        star_method_used: false,
        star_component_score: 0,
        content_quality_score: 0,
        sentiment_score: 0.0,
        fluency_score: 0.0,
        grammar_errors: Vec::new(),
        critique: Critique {
            is_answer_correct: false,
            correctness_feedback:
                "Question was not answered. Correctness cannot be evaluated without a response."
                    .to_string(),
            strengths: vec![
                "Knowing when to move on can be strategic in real interviews".to_string(),
            ],
            weaknesses: vec![
                "Try to attempt every question, even with a partial answer".to_string(),
                "Practice builds confidence - skip less over time".to_string(),
            ],
            feedback_text:
                "Question was skipped. Try to answer all questions for better practice."
                    .to_string(),
            improvement_tips: vec![
                "Even a brief answer shows effort".to_string(),
                "Say \"I would approach this by...\" if unsure".to_string(),
            ],
            recommended_resources: vec![
                ResourceLink {
                    title: "How to Answer Interview Questions You Don't Know".to_string(),
                    url: "https://www.youtube.com/results?search_query=how+to+answer+interview+questions+you+dont+know".to_string(),
                    topic: "Handling unknown questions".to_string(),
                },
                ResourceLink {
                    title: "Interview Tips for Beginners".to_string(),
                    url: "https://www.youtube.com/results?search_query=interview+tips+for+beginners".to_string(),
                    topic: "Basic interview skills".to_string(),
                },
            ],
        },
        critique_source: CritiqueSource::Fallback,
        category: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_rule() {
        assert_eq!(sentiment_for(true), 0.7);
        assert_eq!(sentiment_for(false), 0.5);
    }

    #[test]
    fn test_skip_sentinel_is_not_empty_string() {
        assert!(!SKIP_SENTINEL.is_empty());
        assert_ne!(SKIP_SENTINEL.trim(), "");
    }

    #[test]
    fn test_skipped_record_shape() {
        let record = skipped_record(SKIP_SENTINEL, crate::metrics::normalize(None, ""));
        assert!(!record.critique.is_answer_correct);
        assert_eq!(record.sentiment_score, 0.0);
        assert!(!record.star_method_used);
        assert_eq!(record.content_quality_score, 0);
        assert_eq!(record.critique.recommended_resources.len(), 2);
        assert_eq!(record.critique_source, CritiqueSource::Fallback);
    }
}
