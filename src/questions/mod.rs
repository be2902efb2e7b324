// src/questions/mod.rs
// Question pipeline: AI generation through the gateway, fuzzy
// deduplication, progressive ordering, and a fixed fallback bank. The
// deterministic shell is the contract; generation creativity is not.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::llm::parse::parse_model_json;
use crate::llm::ProviderGateway;

/// Hard cap on questions per session.
pub const MAX_QUESTIONS: usize = 15;

/// Duplicate when raw texts are this sequence-similar...
pub const SIMILARITY_THRESHOLD: f32 = 0.6;
/// ...or when normalized word sets overlap this much (Jaccard).
pub const WORD_OVERLAP_THRESHOLD: f64 = 0.7;

/// High temperature for varied question sets.
const QUESTION_TEMPERATURE: f32 = 0.9;
/// A parsed set smaller than this is treated as a generation failure.
const MIN_GENERATED_QUESTIONS: usize = 10;
/// At most this many previously asked questions go into the prompt.
const MAX_EXCLUDED_IN_PROMPT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub category: String,
    pub difficulty: String,
}

impl Question {
    pub fn new(text: &str, category: &str, difficulty: &str) -> Self {
        Self {
            text: text.to_string(),
            category: category.to_string(),
            difficulty: difficulty.to_string(),
        }
    }
}

// ── Deduplication ───────────────────────────────────────────────────────

static PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Question-phrasing words carrying no topic signal; removed before the
/// word-overlap check so "Tell me about X" and "Describe X" compare equal.
const DEDUP_STOPWORDS: &[&str] = &[
    "tell", "me", "about", "describe", "explain", "what", "how", "why", "can", "you", "a", "an",
    "the", "your",
];

fn normalize_question(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = PUNCT_RE.replace_all(&lower, "");
    stripped
        .split_whitespace()
        .filter(|word| !DEDUP_STOPWORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn is_duplicate(candidate: &Question, kept: &Question) -> bool {
    let new_text = candidate.text.to_lowercase();
    let existing_text = kept.text.to_lowercase();
    let similarity =
        similar::TextDiff::from_chars(new_text.trim(), existing_text.trim()).ratio();

    let new_normalized = normalize_question(&candidate.text);
    let existing_normalized = normalize_question(&kept.text);
    let new_words: HashSet<&str> = new_normalized.split_whitespace().collect();
    let existing_words: HashSet<&str> = existing_normalized.split_whitespace().collect();
    let word_overlap = jaccard(&new_words, &existing_words);

    similarity > SIMILARITY_THRESHOLD || word_overlap > WORD_OVERLAP_THRESHOLD
}

/// Drop rephrasings of already-kept questions. First occurrence wins;
/// order of survivors is preserved.
pub fn deduplicate(questions: Vec<Question>) -> Vec<Question> {
    let mut unique: Vec<Question> = Vec::with_capacity(questions.len());
    for question in questions {
        if let Some(kept) = unique.iter().find(|kept| is_duplicate(&question, kept)) {
            info!(
                skipped = %question.text,
                kept = %kept.text,
                "duplicate question skipped"
            );
            continue;
        }
        unique.push(question);
    }
    unique
}

// ── Ordering ────────────────────────────────────────────────────────────

fn category_rank(category: &str) -> u8 {
    match category.to_lowercase().as_str() {
        "intro" => 1,
        "ai" => 2,
        "project" | "technical" => 3,
        "behavioral" | "situational" => 4,
        _ => 3,
    }
}

fn difficulty_rank(difficulty: &str) -> u8 {
    match difficulty.to_lowercase().as_str() {
        "easy" => 1,
        "medium" => 2,
        "hard" => 3,
        _ => 2,
    }
}

/// Intro warmup first, then technical/project, behavioral last, easier
/// questions ahead of harder ones within a phase. Stable, capped.
pub fn progressive_order(mut questions: Vec<Question>) -> Vec<Question> {
    questions.sort_by_key(|q| (category_rank(&q.category), difficulty_rank(&q.difficulty)));
    questions.truncate(MAX_QUESTIONS);
    questions
}

// ── Fallback bank ───────────────────────────────────────────────────────

/// Fixed question bank used whenever generation yields nothing usable.
pub fn fallback_questions(position: &str, skills: &[String], difficulty: &str) -> Vec<Question> {
    let mut bank = vec![
        Question::new("Tell me about yourself.", "Intro", "Easy"),
        Question::new(
            &format!("What interests you about {position}?"),
            "Intro",
            "Easy",
        ),
        Question::new("Walk me through your resume.", "Intro", "Easy"),
        Question::new(
            "Describe a challenging situation you handled.",
            "Behavioral",
            "Medium",
        ),
        Question::new(
            "Tell me about a time you worked with a difficult team member.",
            "Behavioral",
            "Medium",
        ),
        Question::new("What's your greatest achievement?", "Behavioral", "Easy"),
        Question::new("Where do you see yourself in 5 years?", "Behavioral", "Easy"),
        Question::new(
            "Describe a time you failed and what you learned.",
            "Behavioral",
            "Medium",
        ),
    ];

    for skill in skills.iter().take(3) {
        bank.push(Question::new(
            &format!("How have you used {skill}? Give an example."),
            "Technical",
            difficulty,
        ));
    }

    progressive_order(bank)
}

// ── Generation ──────────────────────────────────────────────────────────

pub struct QuestionPlanner {
    gateway: Arc<ProviderGateway>,
}

impl QuestionPlanner {
    pub fn new(gateway: Arc<ProviderGateway>) -> Self {
        Self { gateway }
    }

    /// Produce the ordered question set for a session. Generation routes
    /// through the gateway; anything short of a valid, large-enough set
    /// falls back to the fixed bank. Never fails.
    pub async fn generate(
        &self,
        position: &str,
        skills: &[String],
        difficulty: &str,
        experience_level: &str,
        excluded: &[String],
    ) -> Vec<Question> {
        if self.gateway.has_providers() {
            let prompt = generation_prompt(position, skills, difficulty, experience_level, excluded);
            if let Some(raw) = self
                .gateway
                .generate("question_generation", &prompt, QUESTION_TEMPERATURE)
                .await
            {
                if let Some(questions) = parse_generated(&raw, difficulty) {
                    info!(count = questions.len(), "generated question set accepted");
                    return progressive_order(deduplicate(questions));
                }
                warn!("generated question set rejected, using fallback bank");
            }
        }

        info!("using fallback question bank");
        fallback_questions(position, skills, difficulty)
    }
}

fn generation_prompt(
    position: &str,
    skills: &[String],
    difficulty: &str,
    experience_level: &str,
    excluded: &[String],
) -> String {
    let excluded_text = if excluded.is_empty() {
        String::new()
    } else {
        let listed: Vec<String> = excluded
            .iter()
            .take(MAX_EXCLUDED_IN_PROMPT)
            .map(|q| format!("- {q}"))
            .collect();
        format!(
            "\n\n**DO NOT ASK THESE (ALREADY ASKED):**\n{}",
            listed.join("\n")
        )
    };

    let skills_list = if skills.is_empty() {
        "general skills".to_string()
    } else {
        skills
            .iter()
            .take(10)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };

    // Random seed in the prompt keeps repeat sessions from converging on
    // the same question set at high temperature.
    let session_seed: u32 = rand::rng().random_range(0..100_000_000);

    format!(
        r#"You are an expert interviewer for a {difficulty} level {position} interview.
{excluded_text}

CANDIDATE: {experience_level}, Skills: {skills_list}
Session: {session_seed:08}

Generate 12-14 UNIQUE interview questions:
- Phase 1 (Q1-4): Intro/warmup
- Phase 2 (Q5-9): Technical deep-dive on their skills
- Phase 3 (Q10-14): Behavioral STAR questions

CRITICAL: Each question MUST be different. Do NOT ask the same thing twice in different words.
- NO duplicate questions
- NO rephrasing of the same question
- Each question should cover a DIFFERENT topic or skill

Output JSON array:
[{{"text": "Question?", "category": "Intro|Technical|Behavioral|Project", "difficulty": "Easy|Medium|Hard"}}]"#
    )
}

/// Validate a generated set: entries without text are dropped, missing
/// category/difficulty are defaulted, and a set below the minimum count
/// is rejected outright.
fn parse_generated(raw: &str, default_difficulty: &str) -> Option<Vec<Question>> {
    let entries: Vec<Value> = parse_model_json(raw)?;

    let validated: Vec<Question> = entries
        .into_iter()
        .filter_map(|entry| {
            let text = entry.get("text")?.as_str()?.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(Question {
                text,
                category: entry
                    .get("category")
                    .and_then(Value::as_str)
                    .unwrap_or("Technical")
                    .to_string(),
                difficulty: entry
                    .get("difficulty")
                    .and_then(Value::as_str)
                    .unwrap_or(default_difficulty)
                    .to_string(),
            })
        })
        .collect();

    if validated.len() >= MIN_GENERATED_QUESTIONS {
        Some(validated)
    } else {
        warn!(
            parsed = validated.len(),
            minimum = MIN_GENERATED_QUESTIONS,
            "too few valid generated questions"
        );
        None
    }
}
