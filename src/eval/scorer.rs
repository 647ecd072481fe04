use std::collections::HashSet;

use serde_json::{json, Map, Value};

/// Result of scoring one run
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    pub provider: String,
    pub scores: Map<String, Value>,
    pub notes: Option<String>,
}

/// Pure scoring function over a run's prompt and output
pub trait Scorer: Send + Sync {
    fn score(&self, input_prompt: &str, final_output: Option<&str>) -> ScoreCard;
}

const TRIMMED: &[char] = &['.', ',', ':', ';', '!', '?', '(', ')', '[', ']', '{', '}', '"', '\''];

/// Free heuristic scorer that never calls out to a model.
///
/// Scores `non_empty_output`, `output_length` (characters of the trimmed
/// output) and `keyword_overlap` (distinct prompt words longer than three
/// characters that also appear in the output).
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBasicScorer;

impl OfflineBasicScorer {
    pub const PROVIDER: &'static str = "offline_basic";
}

fn normalize(word: &str) -> String {
    word.trim_matches(TRIMMED).to_lowercase()
}

impl Scorer for OfflineBasicScorer {
    fn score(&self, input_prompt: &str, final_output: Option<&str>) -> ScoreCard {
        let text = final_output.unwrap_or("").trim();

        let prompt_words: HashSet<String> = input_prompt
            .split_whitespace()
            .filter(|w| w.chars().count() > 3)
            .map(normalize)
            .filter(|w| !w.is_empty())
            .collect();
        let output_words: HashSet<String> = text.split_whitespace().map(normalize).collect();
        let overlap = prompt_words.intersection(&output_words).count();

        let mut scores = Map::new();
        scores.insert("non_empty_output".to_string(), json!(!text.is_empty()));
        scores.insert("output_length".to_string(), json!(text.chars().count()));
        scores.insert("keyword_overlap".to_string(), json!(overlap));

        ScoreCard {
            provider: Self::PROVIDER.to_string(),
            scores,
            notes: Some("Offline heuristic eval (no external calls).".to_string()),
        }
    }
}
