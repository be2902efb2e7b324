// src/heuristics/mod.rs
// Pure text heuristics: STAR-method detection, content-quality scoring,
// percentile estimation. No I/O, no provider involvement.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// An answer shorter than this cannot carry STAR structure.
const STAR_MIN_CHARS: usize = 20;
/// 3 of 4 STAR components present counts as "used" - tolerance for
/// natural, imperfect narration.
const STAR_USED_THRESHOLD: u8 = 3;

const SITUATION_CUES: &[&str] = &[
    "situation",
    "when i was",
    "at my previous",
    "in my role",
    "while working",
];
const TASK_CUES: &[&str] = &[
    "task",
    "needed to",
    "had to",
    "responsible for",
    "my goal was",
];
const ACTION_CUES: &[&str] = &[
    "i did",
    "i created",
    "i implemented",
    "i decided",
    "my approach",
    "i developed",
    "i built",
];
const RESULT_CUES: &[&str] = &[
    "result",
    "outcome",
    "achieved",
    "improved",
    "increased",
    "successfully",
];

const EXAMPLE_SIGNALS: &[&str] = &["for example", "specifically", "such as", "for instance"];

/// Words ignored when measuring question/answer keyword overlap.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "of", "in", "to", "for", "on", "at",
];

static DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());
// Two or more consecutive capitalized words: proper-noun-ish specificity.
static PROPER_NOUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+").unwrap());

/// Detect STAR-method structure in a transcript.
/// Returns `(used, component_score)` where component_score counts the
/// situation/task/action/result categories with at least one cue match.
pub fn detect_star(transcript: &str) -> (bool, u8) {
    if transcript.chars().count() < STAR_MIN_CHARS {
        return (false, 0);
    }

    let lower = transcript.to_lowercase();
    let has = |cues: &[&str]| cues.iter().any(|cue| lower.contains(cue));

    let component_score = [SITUATION_CUES, TASK_CUES, ACTION_CUES, RESULT_CUES]
        .iter()
        .filter(|cues| has(cues))
        .count() as u8;

    (component_score >= STAR_USED_THRESHOLD, component_score)
}

/// Score an answer's content 0-100 from four additive signals:
/// length (30), specificity (25), structure (20), relevance (25).
pub fn content_quality(question_text: &str, answer_text: &str) -> u8 {
    if answer_text.trim().len() < 5 {
        return 0;
    }

    let word_count = answer_text.split_whitespace().count();
    let mut score: u32 = 0;

    // Length (0-30)
    score += match word_count {
        n if n >= 80 => 30,
        n if n >= 60 => 25,
        n if n >= 40 => 20,
        n if n >= 20 => 10,
        _ => 5,
    };

    // Specificity (0-25)
    let lower_answer = answer_text.to_lowercase();
    let mut specificity: u32 = 0;
    if DIGIT_RE.is_match(answer_text) {
        specificity += 8;
    }
    if EXAMPLE_SIGNALS.iter().any(|s| lower_answer.contains(s)) {
        specificity += 10;
    }
    if PROPER_NOUN_RE.is_match(answer_text) {
        specificity += 7;
    }
    score += specificity.min(25);

    // Structure (0-20)
    let (used_star, star_score) = detect_star(answer_text);
    if used_star {
        score += 20;
    } else if star_score >= 2 {
        score += 10;
    }

    // Relevance (0-25): keyword overlap after stopword removal
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    let keywords = |text: &str| -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .filter(|w| !stopwords.contains(w))
            .map(|w| w.to_string())
            .collect()
    };
    let q_words = keywords(question_text);
    let a_words = keywords(answer_text);
    if q_words.is_empty() {
        score += 15;
    } else {
        let overlap = q_words.intersection(&a_words).count();
        let relevance = (overlap as f64 / q_words.len() as f64) * 25.0;
        score += (relevance as u32).min(25);
    }

    score.min(100) as u8
}

/// Percentile threshold tables: (score floor, band label).
const OVERALL_BANDS: &[(u32, &str)] = &[
    (90, "90th percentile"),
    (80, "75th percentile"),
    (70, "60th percentile"),
    (60, "45th percentile"),
    (50, "30th percentile"),
    (40, "20th percentile"),
    (30, "10th percentile"),
];

// Communication scores cluster lower than overall scores, so the
// communication table sits 5 points easier per band.
const COMMUNICATION_BANDS: &[(u32, &str)] = &[
    (85, "90th percentile"),
    (75, "75th percentile"),
    (65, "60th percentile"),
    (55, "45th percentile"),
    (45, "30th percentile"),
    (35, "20th percentile"),
    (25, "10th percentile"),
];

/// Map a 0-100 score to one of 8 percentile bands. Unknown metric types
/// use the overall table.
pub fn estimate_percentile(score: u32, metric_type: &str) -> &'static str {
    let table = match metric_type {
        "communication" => COMMUNICATION_BANDS,
        _ => OVERALL_BANDS,
    };

    for (floor, band) in table {
        if score >= *floor {
            return band;
        }
    }
    "Below 10th percentile"
}
