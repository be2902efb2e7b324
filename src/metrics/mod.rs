// src/metrics/mod.rs
// Voice/timing telemetry validation. Client metrics arrive as loosely
// structured JSON; everything downstream gets a fully-populated value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Default pace assumed when the client supplies no timing at all.
pub const DEFAULT_WPM: u32 = 120;
/// Default microphone level when the client reports none.
pub const DEFAULT_VOLUME: f64 = 0.5;
/// Fluency signal is bounded to [0, 5] wherever it comes from.
pub const FLUENCY_MAX: f64 = 5.0;

/// Fully-populated per-answer voice metrics. Built once by [`normalize`]
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceMetrics {
    pub word_count: u32,
    pub words_per_minute: u32,
    pub speaking_duration_seconds: f64,
    pub pause_count: u32,
    pub average_volume: f64,
    pub filler_words: HashMap<String, u32>,
}

impl VoiceMetrics {
    pub fn total_fillers(&self) -> u32 {
        self.filler_words.values().sum()
    }

    /// The filler word used most often, if any were counted.
    pub fn top_filler(&self) -> Option<&str> {
        self.filler_words
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(word, _)| word.as_str())
    }
}

/// Validate client-supplied metrics and fill every gap. Total function:
/// any input shape (including absent or non-object) yields usable metrics.
///
/// The client payload nests the interesting part under `voiceMetrics`.
pub fn normalize(raw_metrics: Option<&Value>, transcript: &str) -> VoiceMetrics {
    let voice = raw_metrics
        .and_then(|m| m.get("voiceMetrics"))
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();

    let mut word_count = voice
        .get("word_count")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    if word_count == 0 {
        word_count = transcript.split_whitespace().count() as u32;
        debug!(word_count, "word count derived from transcript");
    }

    let reported_duration = voice
        .get("speaking_duration_seconds")
        .and_then(Value::as_f64)
        .filter(|d| *d > 0.0);
    let reported_wpm = voice
        .get("words_per_minute")
        .and_then(Value::as_u64)
        .map(|w| w as u32)
        .filter(|w| *w > 0);

    let (words_per_minute, speaking_duration_seconds) = match (reported_wpm, reported_duration) {
        (Some(wpm), Some(duration)) => (wpm, duration),
        (None, Some(duration)) => {
            let wpm = ((word_count as f64 / duration) * 60.0).round() as u32;
            (wpm, duration)
        }
        // No usable duration: assume a conversational pace and back-fill.
        (Some(wpm), None) => (wpm, word_count as f64 / 2.0),
        (None, None) => (DEFAULT_WPM, word_count as f64 / 2.0),
    };

    let filler_words = voice
        .get("filler_words")
        .and_then(Value::as_object)
        .map(|fillers| {
            fillers
                .iter()
                .filter_map(|(word, count)| {
                    count.as_u64().map(|c| (word.clone(), c as u32))
                })
                .collect()
        })
        .unwrap_or_default();

    let pause_count = voice
        .get("pause_count")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;

    let average_volume = voice
        .get("average_volume")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_VOLUME)
        .clamp(0.0, 1.0);

    VoiceMetrics {
        word_count,
        words_per_minute,
        speaking_duration_seconds,
        pause_count,
        average_volume,
        filler_words,
    }
}

/// Extract the client's 0-5 fluency signal from the raw payload, clamped
/// to bounds. `None` when the client did not report one; the evaluator
/// substitutes its own bounded default.
pub fn fluency_signal(raw_metrics: Option<&Value>) -> Option<f64> {
    raw_metrics
        .and_then(|m| m.get("fluency_score"))
        .and_then(Value::as_f64)
        .map(|f| f.clamp(0.0, FLUENCY_MAX))
}
