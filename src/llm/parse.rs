// src/llm/parse.rs
// Lenient parsing of model output. Models wrap JSON in markdown fences
// and emit trailing commas; parse failure is an ordinary outcome the
// caller turns into a fallback, never an error.

use serde::de::DeserializeOwned;
use tracing::debug;

/// Strip markdown code fences (```json ... ```) around a payload.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Repair the JSON damage models most often inflict.
fn repair_json_simple(json_str: &str) -> String {
    json_str
        .replace(",]", "]")
        .replace(",}", "}")
        .replace("undefined", "null")
        .replace("NaN", "null")
}

/// Parse model output into a typed value: fences stripped, strict parse
/// first, then one repaired attempt. `None` means the caller falls back.
pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let payload = strip_code_fences(text);

    if let Ok(value) = serde_json::from_str(payload) {
        return Some(value);
    }

    match serde_json::from_str(&repair_json_simple(payload)) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("model output unparsable even after repair: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, PartialEq, Debug)]
    struct Sample {
        score: u32,
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_fenced_json() {
        let parsed: Option<Sample> = parse_model_json("```json\n{\"score\": 42}\n```");
        assert_eq!(parsed, Some(Sample { score: 42 }));
    }

    #[test]
    fn test_parse_repairs_trailing_comma() {
        let parsed: Option<Sample> = parse_model_json("{\"score\": 7,}");
        assert_eq!(parsed, Some(Sample { score: 7 }));
    }

    #[test]
    fn test_unparsable_yields_none() {
        let parsed: Option<Sample> = parse_model_json("I'd be happy to help with that!");
        assert!(parsed.is_none());
    }
}
