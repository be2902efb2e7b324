// src/report/mod.rs
// Session-level aggregation: reduce per-answer records into category
// scores, an overall score, and a coaching report. The numeric core is
// fully deterministic; the gateway only narrates, it never re-scores.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::evaluator::{AnswerRecord, CritiqueSource, ResourceLink};
use crate::heuristics::estimate_percentile;
use crate::llm::parse::parse_model_json;
use crate::llm::ProviderGateway;

// ── Scoring constants ───────────────────────────────────────────────────

/// Ideal speaking-pace band; full pace credit inside it.
const IDEAL_WPM_MIN: f64 = 100.0;
const IDEAL_WPM_MAX: f64 = 150.0;
/// Midpoint of the ideal band; penalty grows symmetrically around it.
const WPM_MIDPOINT: f64 = 125.0;
const PACE_PENALTY_PER_WPM: f64 = 0.8;

const FILLER_PENALTY_PER_AVG: f64 = 12.0;
const FILLER_PENALTY_CAP: f64 = 50.0;

const W_PACE: f64 = 0.5;
const W_FILLER: f64 = 0.3;
/// Fluency signal is 0-5; this scales it to a 0-100 contribution of up
/// to 20 points.
const FLUENCY_WEIGHT: f64 = 20.0;

const DEPTH_PER_WORD: f64 = 1.5;
const W_CONTENT_QUALITY: f64 = 0.5;
const W_DEPTH: f64 = 0.3;
const W_SENTIMENT: f64 = 0.2;

/// Canonical overall blend. Technical/behavioral only contribute when at
/// least one answer carries that category tag; with neither present the
/// normalized blend reduces to equal communication/content weighting.
const W_COMMUNICATION: f64 = 0.4;
const W_CONTENT: f64 = 0.4;
const W_TECHNICAL: f64 = 0.1;
const W_BEHAVIORAL: f64 = 0.1;

const GRAMMAR_PENALTY_PER_ISSUE: u32 = 5;

/// Narrative temperature: moderate, coaching tone.
const NARRATIVE_TEMPERATURE: f32 = 0.7;
const MAX_NARRATIVE_ITEMS: usize = 5;
const MAX_LEARNING_PATH: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    /// "No data yet" - distinct from a report that scored zero.
    #[error("no responses to aggregate for this session")]
    NoResponses,
}

// ── Report shapes ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub name: String,
    pub score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub total_questions: usize,
    pub avg_answer_length: String,
    pub speaking_pace: String,
    pub filler_frequency: String,
    pub star_usage: String,
    pub content_quality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarBreakdown {
    pub score: u8,
    pub total_issues: usize,
    pub top_issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub overall_score: u8,
    pub percentile: String,
    pub category_scores: Vec<CategoryScore>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub recommendations: Vec<String>,
    pub key_metrics: KeyMetrics,
    pub grammar: GrammarBreakdown,
    pub learning_path: Vec<ResourceLink>,
    pub key_insights: String,
    pub progress_note: String,
    /// Whether the narrative strings came from a backend or the
    /// deterministic threshold rules. Numeric scores are always local.
    pub narrative_source: CritiqueSource,
}

// ── Aggregation ─────────────────────────────────────────────────────────

/// Per-session averages computed in one pass over the records.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    pub count: usize,
    pub avg_wpm: f64,
    pub avg_fillers: f64,
    pub avg_words: f64,
    pub avg_pauses: f64,
    pub avg_fluency: f64,
    pub avg_sentiment: f64,
    pub avg_content: f64,
    pub star_count: usize,
    pub star_pct: f64,
    pub grammar_errors: Vec<String>,
}

pub fn aggregate(records: &[AnswerRecord]) -> Result<Aggregates, ReportError> {
    if records.is_empty() {
        return Err(ReportError::NoResponses);
    }
    let count = records.len();
    let n = count as f64;

    let mut total_wpm = 0.0;
    let mut total_fillers = 0.0;
    let mut total_words = 0.0;
    let mut total_pauses = 0.0;
    let mut total_fluency = 0.0;
    let mut total_sentiment = 0.0;
    let mut total_content = 0.0;
    let mut star_count = 0;
    let mut grammar_errors = Vec::new();

    for record in records {
        total_wpm += record.voice_metrics.words_per_minute as f64;
        total_fillers += record.voice_metrics.total_fillers() as f64;
        total_words += record.voice_metrics.word_count as f64;
        total_pauses += record.voice_metrics.pause_count as f64;
        total_fluency += record.fluency_score;
        total_sentiment += record.sentiment_score;
        total_content += record.content_quality_score as f64;
        if record.star_method_used {
            star_count += 1;
        }
        grammar_errors.extend(record.grammar_errors.iter().cloned());
    }

    Ok(Aggregates {
        count,
        avg_wpm: total_wpm / n,
        avg_fillers: total_fillers / n,
        avg_words: total_words / n,
        avg_pauses: total_pauses / n,
        avg_fluency: total_fluency / n,
        avg_sentiment: total_sentiment / n,
        avg_content: total_content / n,
        star_count,
        star_pct: (star_count as f64 / n) * 100.0,
        grammar_errors,
    })
}

/// Deterministic numeric scores derived from the aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub pace_score: f64,
    pub filler_penalty: f64,
    pub communication: u8,
    pub content: u8,
    /// Present only when at least one answer carries the category tag.
    pub technical: Option<u8>,
    pub behavioral: Option<u8>,
    pub overall: u8,
}

fn clip100(value: f64) -> u8 {
    (value as i64).clamp(0, 100) as u8
}

fn category_average(records: &[AnswerRecord], tag: &str) -> Option<u8> {
    let scores: Vec<f64> = records
        .iter()
        .filter(|r| r.category.to_lowercase().contains(tag))
        .map(|r| r.content_quality_score as f64)
        .collect();
    if scores.is_empty() {
        None
    } else {
        Some(clip100(scores.iter().sum::<f64>() / scores.len() as f64))
    }
}

pub fn compute_scores(aggregates: &Aggregates, records: &[AnswerRecord]) -> Scores {
    let pace_score = if (IDEAL_WPM_MIN..=IDEAL_WPM_MAX).contains(&aggregates.avg_wpm) {
        100.0
    } else {
        (100.0 - (aggregates.avg_wpm - WPM_MIDPOINT).abs() * PACE_PENALTY_PER_WPM).max(0.0)
    };

    let filler_penalty = (aggregates.avg_fillers * FILLER_PENALTY_PER_AVG).min(FILLER_PENALTY_CAP);

    let communication = clip100(
        pace_score * W_PACE
            + (100.0 - filler_penalty) * W_FILLER
            + aggregates.avg_fluency * FLUENCY_WEIGHT,
    );

    let depth_score = (aggregates.avg_words * DEPTH_PER_WORD).min(100.0);
    let sentiment_adjusted = aggregates.avg_sentiment * 50.0 + 50.0;
    let content = clip100(
        aggregates.avg_content * W_CONTENT_QUALITY
            + depth_score * W_DEPTH
            + sentiment_adjusted * W_SENTIMENT,
    );

    let technical = category_average(records, "technical");
    let behavioral = category_average(records, "behavioral");

    // Weighted blend over the categories that actually have answers,
    // renormalized so absent categories contribute nothing.
    let mut weighted = communication as f64 * W_COMMUNICATION + content as f64 * W_CONTENT;
    let mut weight_sum = W_COMMUNICATION + W_CONTENT;
    if let Some(score) = technical {
        weighted += score as f64 * W_TECHNICAL;
        weight_sum += W_TECHNICAL;
    }
    if let Some(score) = behavioral {
        weighted += score as f64 * W_BEHAVIORAL;
        weight_sum += W_BEHAVIORAL;
    }
    let overall = clip100(weighted / weight_sum);

    Scores {
        pace_score,
        filler_penalty,
        communication,
        content,
        technical,
        behavioral,
        overall,
    }
}

// ── Narrative ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NarrativeJson {
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    areas_for_improvement: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    learning_path: Vec<ResourceLink>,
    #[serde(default)]
    key_insights: String,
    #[serde(default)]
    progress_note: String,
}

#[derive(Debug, Default)]
struct Narrative {
    strengths: Vec<String>,
    improvements: Vec<String>,
    recommendations: Vec<String>,
    learning_path: Vec<ResourceLink>,
    key_insights: String,
    progress_note: String,
}

/// Threshold-rule narrative used whenever no backend narrates. Each
/// numeric branch maps to exactly one of strength/improvement.
fn fallback_narrative(aggregates: &Aggregates, scores: &Scores) -> Narrative {
    let mut n = Narrative::default();
    let wpm = aggregates.avg_wpm;
    let fillers = aggregates.avg_fillers;

    // Pace
    if (IDEAL_WPM_MIN..=IDEAL_WPM_MAX).contains(&wpm) {
        n.strengths.push(format!(
            "Excellent speaking pace ({} wpm) - confident and clear",
            wpm as i64
        ));
    } else if (80.0..IDEAL_WPM_MIN).contains(&wpm) {
        n.strengths.push(format!(
            "Steady pace ({} wpm) - thoughtful delivery",
            wpm as i64
        ));
    } else if wpm > 0.0 && wpm < 80.0 {
        n.improvements.push(format!(
            "Speaking pace was slow ({} wpm) - aim for 120-140 wpm",
            wpm as i64
        ));
        n.recommendations
            .push("Practice speaking at natural conversational speed daily".to_string());
    } else if wpm > 160.0 {
        n.improvements.push(format!(
            "Speaking pace was fast ({} wpm) - slow down",
            wpm as i64
        ));
        n.recommendations
            .push("Take deliberate pauses between key points".to_string());
    }

    // Filler words
    if fillers <= 1.0 {
        n.strengths
            .push("Minimal filler words - polished delivery".to_string());
    } else if fillers <= 3.0 {
        n.strengths
            .push(format!("Low filler usage ({fillers:.1} per answer)"));
    } else {
        n.improvements
            .push(format!("High filler word usage ({fillers:.1} per answer)"));
        n.recommendations
            .push("Record practice sessions and track filler word reduction".to_string());
    }

    // Answer depth
    if aggregates.avg_words >= 70.0 {
        n.strengths.push(format!(
            "Detailed answers ({} words avg) - excellent depth",
            aggregates.avg_words as i64
        ));
    } else if aggregates.avg_words < 35.0 {
        n.improvements.push(format!(
            "Brief answers ({} words avg) - elaborate more",
            aggregates.avg_words as i64
        ));
        n.recommendations
            .push("Use STAR method to structure longer, more detailed answers".to_string());
    }

    // Grammar
    let issue_count = aggregates.grammar_errors.len();
    if issue_count == 0 {
        n.strengths
            .push("Grammatically clear speech throughout interview".to_string());
    } else if issue_count <= 3 {
        n.strengths
            .push("Minor grammar issues - overall very clear".to_string());
    } else {
        n.improvements
            .push(format!("Found {issue_count} grammar issues"));
        n.recommendations
            .push("Practice speaking in complete, grammatically correct sentences".to_string());
    }

    // STAR method
    if aggregates.star_pct >= 60.0 {
        n.strengths.push(format!(
            "Strong use of STAR method ({}/{} answers)",
            aggregates.star_count, aggregates.count
        ));
    } else if aggregates.star_pct >= 30.0 {
        n.improvements.push(format!(
            "Partial STAR usage ({}/{}) - use more consistently",
            aggregates.star_count, aggregates.count
        ));
        n.recommendations
            .push("Practice structuring all behavioral answers with STAR".to_string());
    } else {
        n.improvements
            .push("Limited use of STAR method structure".to_string());
        n.recommendations
            .push("Learn and practice STAR method for behavioral questions".to_string());
    }

    // Content quality
    if aggregates.avg_content >= 70.0 {
        n.strengths.push(format!(
            "High content quality ({}/100) - specific and relevant",
            aggregates.avg_content as i64
        ));
    } else if aggregates.avg_content < 50.0 {
        n.improvements.push(format!(
            "Content quality needs improvement ({}/100)",
            aggregates.avg_content as i64
        ));
        n.recommendations
            .push("Include more specific examples and concrete details in answers".to_string());
    }

    // Pauses
    if aggregates.avg_pauses <= 2.0 {
        n.strengths
            .push("Smooth delivery with minimal pauses".to_string());
    } else if aggregates.avg_pauses > 4.0 {
        n.improvements.push(format!(
            "Frequent pauses ({:.1} avg) - may indicate nervousness",
            aggregates.avg_pauses
        ));
        n.recommendations
            .push("Prepare mental outlines before answering to reduce pauses".to_string());
    }

    if n.strengths.is_empty() {
        n.strengths
            .push("Completed the interview successfully".to_string());
    }
    if n.improvements.is_empty() {
        n.improvements
            .push("Continue practicing to refine skills".to_string());
    }
    if n.recommendations.is_empty() {
        n.recommendations = vec![
            "Practice common interview questions daily".to_string(),
            "Record yourself and review for improvement areas".to_string(),
            "Use STAR method for behavioral questions".to_string(),
        ];
    }

    n.key_insights = format!(
        "You completed {} questions with an overall score of {}/100. Your strengths include: {}",
        aggregates.count, scores.overall, n.strengths[0]
    );
    n.progress_note = "Remember: every interview is practice. You're building skills that will \
                       serve you throughout your career. Keep going!"
        .to_string();
    n
}

fn narrative_prompt(aggregates: &Aggregates, scores: &Scores) -> String {
    format!(
        r#"You are an expert interview coach. Generate a FINAL REPORT for a beginner candidate.

**SESSION STATS:**
- Total Questions: {count}
- Overall Score: {overall}/100
- Communication: {comm}/100 (pace: {wpm} wpm, fillers: {fillers:.1}/answer, pauses: {pauses:.1})
- Content Quality: {content}/100 (avg words: {words}, quality: {quality}/100)
- STAR Usage: {star_count}/{count} ({star_pct:.0}%)
- Grammar Issues: {grammar}

Create an encouraging, actionable report. Return JSON:
{{
  "strengths": ["Specific strength 1", "..."],
  "areas_for_improvement": ["Specific improvement 1", "..."],
  "recommendations": ["Actionable tip 1", "..."],
  "learning_path": [{{"title": "Resource Title", "url": "https://...", "topic": "Topic"}}],
  "key_insights": "2-3 sentence overall assessment",
  "progress_note": "Encouraging final message"
}}
Return ONLY valid JSON."#,
        count = aggregates.count,
        overall = scores.overall,
        comm = scores.communication,
        wpm = aggregates.avg_wpm as i64,
        fillers = aggregates.avg_fillers,
        pauses = aggregates.avg_pauses,
        content = scores.content,
        words = aggregates.avg_words as i64,
        quality = aggregates.avg_content as i64,
        star_count = aggregates.star_count,
        star_pct = aggregates.star_pct,
        grammar = aggregates.grammar_errors.len(),
    )
}

// ── Aggregator ──────────────────────────────────────────────────────────

pub struct ReportAggregator {
    gateway: Arc<ProviderGateway>,
}

impl ReportAggregator {
    pub fn new(gateway: Arc<ProviderGateway>) -> Self {
        Self { gateway }
    }

    /// Build the session report. Numeric scores are always the locally
    /// computed values; a backend may only replace the narrative text.
    /// Idempotent: unchanged records yield identical numeric scores.
    pub async fn generate_report(
        &self,
        records: &[AnswerRecord],
    ) -> Result<SessionReport, ReportError> {
        let aggregates = aggregate(records)?;
        let scores = compute_scores(&aggregates, records);

        let (narrative, narrative_source) = if self.gateway.has_providers() {
            match self.request_narrative(&aggregates, &scores).await {
                Some(narrative) => (narrative, CritiqueSource::Ai),
                None => (fallback_narrative(&aggregates, &scores), CritiqueSource::Fallback),
            }
        } else {
            (fallback_narrative(&aggregates, &scores), CritiqueSource::Fallback)
        };

        info!(
            overall = scores.overall,
            communication = scores.communication,
            content = scores.content,
            source = ?narrative_source,
            "session report generated"
        );

        Ok(build_report(&aggregates, &scores, narrative, narrative_source))
    }

    async fn request_narrative(
        &self,
        aggregates: &Aggregates,
        scores: &Scores,
    ) -> Option<Narrative> {
        let prompt = narrative_prompt(aggregates, scores);
        let raw = self
            .gateway
            .generate("final_report", &prompt, NARRATIVE_TEMPERATURE)
            .await?;

        let Some(parsed) = parse_model_json::<NarrativeJson>(&raw) else {
            warn!("narrative response unparsable, using deterministic narrative");
            return None;
        };

        // An empty narrative is as useless as none.
        if parsed.strengths.is_empty() && parsed.areas_for_improvement.is_empty() {
            return None;
        }

        let cap = |mut items: Vec<String>| {
            items.truncate(MAX_NARRATIVE_ITEMS);
            items
        };
        let mut learning_path = parsed.learning_path;
        learning_path.truncate(MAX_LEARNING_PATH);

        Some(Narrative {
            strengths: cap(parsed.strengths),
            improvements: cap(parsed.areas_for_improvement),
            recommendations: cap(parsed.recommendations),
            learning_path,
            key_insights: parsed.key_insights,
            progress_note: parsed.progress_note,
        })
    }
}

fn build_report(
    aggregates: &Aggregates,
    scores: &Scores,
    narrative: Narrative,
    narrative_source: CritiqueSource,
) -> SessionReport {
    let mut category_scores = vec![
        CategoryScore {
            name: "Communication".to_string(),
            score: scores.communication,
            percentile: Some(
                estimate_percentile(scores.communication as u32, "communication").to_string(),
            ),
        },
        CategoryScore {
            name: "Content Quality".to_string(),
            score: scores.content,
            percentile: None,
        },
    ];
    if let Some(score) = scores.technical {
        category_scores.push(CategoryScore {
            name: "Technical".to_string(),
            score,
            percentile: None,
        });
    }
    if let Some(score) = scores.behavioral {
        category_scores.push(CategoryScore {
            name: "Behavioral".to_string(),
            score,
            percentile: None,
        });
    }

    let issue_count = aggregates.grammar_errors.len();
    let mut top_issues: Vec<String> = aggregates.grammar_errors.clone();
    top_issues.dedup();
    top_issues.truncate(5);

    SessionReport {
        overall_score: scores.overall,
        percentile: estimate_percentile(scores.overall as u32, "overall").to_string(),
        category_scores,
        strengths: narrative.strengths,
        areas_for_improvement: narrative.improvements,
        recommendations: narrative.recommendations,
        key_metrics: KeyMetrics {
            total_questions: aggregates.count,
            avg_answer_length: format!("{} words", aggregates.avg_words as i64),
            speaking_pace: format!("{} wpm", aggregates.avg_wpm as i64),
            filler_frequency: format!("{:.1} per answer", aggregates.avg_fillers),
            star_usage: format!("{:.0}%", aggregates.star_pct),
            content_quality: format!("{}/100", aggregates.avg_content as i64),
        },
        grammar: GrammarBreakdown {
            score: (100_i64 - (issue_count as i64 * GRAMMAR_PENALTY_PER_ISSUE as i64)).max(0) as u8,
            total_issues: issue_count,
            top_issues,
        },
        learning_path: narrative.learning_path,
        key_insights: narrative.key_insights,
        progress_note: narrative.progress_note,
        narrative_source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Critique;
    use crate::metrics::VoiceMetrics;
    use std::collections::HashMap;

    fn record(wpm: u32, words: u32, fillers: u32, content: u8, star: bool) -> AnswerRecord {
        let mut filler_words = HashMap::new();
        if fillers > 0 {
            filler_words.insert("um".to_string(), fillers);
        }
        AnswerRecord {
            transcript: "test".to_string(),
            voice_metrics: VoiceMetrics {
                word_count: words,
                words_per_minute: wpm,
                speaking_duration_seconds: 30.0,
                pause_count: 1,
                average_volume: 0.5,
                filler_words,
            },
            star_method_used: star,
            star_component_score: if star { 3 } else { 1 },
            content_quality_score: content,
            sentiment_score: 0.5,
            fluency_score: 1.0,
            grammar_errors: Vec::new(),
            critique: Critique {
                is_answer_correct: true,
                correctness_feedback: String::new(),
                strengths: Vec::new(),
                weaknesses: Vec::new(),
                feedback_text: String::new(),
                improvement_tips: Vec::new(),
                recommended_resources: Vec::new(),
            },
            critique_source: CritiqueSource::Fallback,
            category: String::new(),
        }
    }

    #[test]
    fn test_aggregate_empty_is_distinct_error() {
        assert_eq!(aggregate(&[]), Err(ReportError::NoResponses));
    }

    #[test]
    fn test_pace_score_ideal_band() {
        let records = vec![record(125, 100, 0, 80, false); 5];
        let aggregates = aggregate(&records).unwrap();
        let scores = compute_scores(&aggregates, &records);
        assert_eq!(scores.pace_score, 100.0);
        assert_eq!(scores.filler_penalty, 0.0);
    }

    #[test]
    fn test_pace_penalty_symmetric() {
        let slow = vec![record(75, 100, 0, 80, false)];
        let fast = vec![record(175, 100, 0, 80, false)];
        let slow_scores = compute_scores(&aggregate(&slow).unwrap(), &slow);
        let fast_scores = compute_scores(&aggregate(&fast).unwrap(), &fast);
        assert_eq!(slow_scores.pace_score, fast_scores.pace_score);
        assert_eq!(slow_scores.pace_score, 100.0 - 50.0 * 0.8);
    }

    #[test]
    fn test_filler_penalty_capped() {
        let records = vec![record(125, 100, 50, 80, false)];
        let scores = compute_scores(&aggregate(&records).unwrap(), &records);
        assert_eq!(scores.filler_penalty, 50.0);
    }

    #[test]
    fn test_fixed_point_regression_five_ideal_answers() {
        // wpm=125, 0 fillers, content=80, 100 words, sentiment 0.5,
        // fluency 1.0 per record.
        let records = vec![record(125, 100, 0, 80, false); 5];
        let aggregates = aggregate(&records).unwrap();
        let scores = compute_scores(&aggregates, &records);

        // communication = 0.5*100 + 0.3*100 + 1.0*20 = 100
        assert_eq!(scores.communication, 100);
        // depth = min(100, 100*1.5) = 100; sentiment_adj = 75
        // content = 0.5*80 + 0.3*100 + 0.2*75 = 85
        assert_eq!(scores.content, 85);
        // no categorized answers: (0.4*100 + 0.4*85) / 0.8 = 92.5 -> 92
        assert_eq!(scores.overall, 92);
    }

    #[test]
    fn test_category_scores_gated_on_membership() {
        let mut technical = record(125, 100, 0, 90, false);
        technical.category = "Technical".to_string();
        let plain = record(125, 100, 0, 60, false);

        let records = vec![technical, plain];
        let aggregates = aggregate(&records).unwrap();
        let scores = compute_scores(&aggregates, &records);

        assert_eq!(scores.technical, Some(90));
        assert_eq!(scores.behavioral, None);
    }

    #[test]
    fn test_overall_uses_only_present_categories() {
        let records = vec![record(125, 100, 0, 80, false); 3];
        let scores = compute_scores(&aggregate(&records).unwrap(), &records);
        // With no technical/behavioral answers the blend must reduce to
        // equal communication/content weighting.
        let expected = ((scores.communication as f64 * 0.4 + scores.content as f64 * 0.4) / 0.8)
            as i64;
        assert_eq!(scores.overall as i64, expected);
    }

    #[test]
    fn test_scores_idempotent() {
        let records = vec![record(110, 80, 2, 70, true); 4];
        let aggregates = aggregate(&records).unwrap();
        let first = compute_scores(&aggregates, &records);
        let second = compute_scores(&aggregate(&records).unwrap(), &records);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallback_narrative_branches_exclusive() {
        // Ideal everything: only strengths fire on pace/filler/star rows.
        let records = vec![record(125, 100, 0, 80, true); 5];
        let aggregates = aggregate(&records).unwrap();
        let scores = compute_scores(&aggregates, &records);
        let narrative = fallback_narrative(&aggregates, &scores);

        assert!(narrative
            .strengths
            .iter()
            .any(|s| s.contains("speaking pace")));
        assert!(!narrative
            .improvements
            .iter()
            .any(|s| s.contains("pace")));
        assert!(narrative
            .strengths
            .iter()
            .any(|s| s.contains("STAR method")));
    }

    #[test]
    fn test_fallback_narrative_struggling_session() {
        let records = vec![record(60, 20, 6, 30, false); 3];
        let aggregates = aggregate(&records).unwrap();
        let scores = compute_scores(&aggregates, &records);
        let narrative = fallback_narrative(&aggregates, &scores);

        assert!(narrative.improvements.iter().any(|s| s.contains("slow")));
        assert!(narrative
            .improvements
            .iter()
            .any(|s| s.contains("filler word usage")));
        assert!(narrative.improvements.iter().any(|s| s.contains("Brief")));
        assert!(!narrative.recommendations.is_empty());
    }

    #[test]
    fn test_grammar_breakdown_penalty() {
        let mut bad = record(125, 100, 0, 80, false);
        bad.grammar_errors = vec!["issue".to_string(); 4];
        let records = vec![bad];
        let aggregates = aggregate(&records).unwrap();
        let scores = compute_scores(&aggregates, &records);
        let report = build_report(
            &aggregates,
            &scores,
            fallback_narrative(&aggregates, &scores),
            CritiqueSource::Fallback,
        );
        assert_eq!(report.grammar.score, 80);
        assert_eq!(report.grammar.total_issues, 4);
    }
}
