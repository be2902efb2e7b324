// tests/evaluator_pipeline.rs
// End-to-end evaluator behavior: skip sentinel short-circuit, fallback
// critique when no backend answers, and AI critique adoption.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use interviewiq::evaluator::grammar::DisabledGrammarChecker;
use interviewiq::evaluator::{CritiqueSource, ResponseEvaluator, SKIP_SENTINEL};
use interviewiq::llm::{ProviderError, ProviderGateway, ProviderRegistry, TextProvider};

struct CannedProvider {
    reply: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TextProvider for CannedProvider {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

fn evaluator_with_provider(reply: &str) -> (ResponseEvaluator, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = ProviderRegistry::new(
        vec![Arc::new(CannedProvider {
            reply: reply.to_string(),
            calls: Arc::clone(&calls),
        })],
        Vec::new(),
        Vec::new(),
    );
    let gateway = Arc::new(ProviderGateway::new(
        registry,
        Duration::from_secs(1),
        Duration::from_secs(1),
    ));
    (
        ResponseEvaluator::new(gateway, Arc::new(DisabledGrammarChecker)),
        calls,
    )
}

fn evaluator_without_providers() -> ResponseEvaluator {
    let gateway = Arc::new(ProviderGateway::new(
        ProviderRegistry::default(),
        Duration::from_secs(1),
        Duration::from_secs(1),
    ));
    ResponseEvaluator::new(gateway, Arc::new(DisabledGrammarChecker))
}

#[tokio::test]
async fn skip_sentinel_never_reaches_a_provider() {
    let (evaluator, calls) = evaluator_with_provider("{\"feedback_text\": \"unused\"}");

    let record = evaluator
        .evaluate("Tell me about yourself.", SKIP_SENTINEL, None)
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(record.critique_source, CritiqueSource::Fallback);
    assert!(!record.critique.is_answer_correct);
    assert_eq!(record.content_quality_score, 0);
    assert_eq!(record.sentiment_score, 0.0);
    assert_eq!(record.fluency_score, 0.0);
    assert!(!record.star_method_used);
    assert_eq!(record.critique.recommended_resources.len(), 2);
}

#[tokio::test]
async fn empty_registry_uses_fallback_critique_but_still_scores() {
    let evaluator = evaluator_without_providers();

    let answer = "In my role as a developer I had to fix a slow endpoint. \
                  I implemented caching and the result was a 40% improvement.";
    let record = evaluator
        .evaluate("Describe a performance problem you solved.", answer, None)
        .await;

    // Heuristics ran even though no backend exists.
    assert!(record.star_method_used);
    assert!(record.content_quality_score > 0);
    assert_eq!(record.sentiment_score, 0.7);

    assert_eq!(record.critique_source, CritiqueSource::Fallback);
    assert_eq!(record.critique.strengths, vec!["Clear audio".to_string()]);
    assert_eq!(
        record.critique.weaknesses,
        vec!["Analysis unavailable".to_string()]
    );
    assert_eq!(
        record.critique.improvement_tips,
        vec!["Check connection".to_string()]
    );
}

#[tokio::test]
async fn ai_critique_is_adopted_and_capped() {
    let reply = json!({
        "is_answer_correct": false,
        "correctness_feedback": "The complexity analysis was wrong.",
        "strengths": ["s1", "s2", "s3", "s4"],
        "weaknesses": ["w1"],
        "feedback_text": "Tighten the explanation.",
        "improvement_tips": ["t1", "t2", "t3"],
        "recommended_resources": []
    })
    .to_string();
    let (evaluator, calls) = evaluator_with_provider(&reply);

    let record = evaluator
        .evaluate(
            "Explain the time complexity of quicksort.",
            "Quicksort is O(n log n) on average because the pivot splits the input.",
            None,
        )
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(record.critique_source, CritiqueSource::Ai);
    assert!(!record.critique.is_answer_correct);
    // Caps: 3 strengths, 2 tips.
    assert_eq!(record.critique.strengths.len(), 3);
    assert_eq!(record.critique.improvement_tips.len(), 2);
    assert_eq!(record.critique.feedback_text, "Tighten the explanation.");
}

#[tokio::test]
async fn unparsable_ai_reply_falls_back() {
    let (evaluator, calls) = evaluator_with_provider("Sure! Here are my thoughts on the answer.");

    let record = evaluator
        .evaluate("Tell me about yourself.", "I am a backend developer.", None)
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(record.critique_source, CritiqueSource::Fallback);
    assert_eq!(record.critique.strengths, vec!["Clear audio".to_string()]);
}

#[tokio::test]
async fn client_fluency_signal_overrides_star_default() {
    let evaluator = evaluator_without_providers();
    let metrics = json!({
        "fluency_score": 4.5,
        "voiceMetrics": {"word_count": 12, "words_per_minute": 130}
    });

    let record = evaluator
        .evaluate(
            "Tell me about yourself.",
            "I am a developer with three years of experience in Rust.",
            Some(&metrics),
        )
        .await;

    assert_eq!(record.fluency_score, 4.5);
    assert_eq!(record.voice_metrics.words_per_minute, 130);
}
