//! Action matcher: maps raw player input onto a cached prediction.
//!
//! Confidence combines the best regex hit among a prediction's input
//! patterns with token-level Jaccard overlap against the verb family and
//! target display name. Below the threshold the matcher signals a miss and
//! the turn falls through to synchronous generation.

use regex_lite::Regex;

use fateweaver_domain::{ActionPrediction, ActionType};

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "at", "to", "of", "on", "in", "with", "my", "that", "this",
];

pub struct ActionMatcher {
    min_confidence: f32,
}

impl ActionMatcher {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    /// Best-scoring prediction at or above the confidence threshold.
    pub fn match_input<'p>(
        &self,
        input: &str,
        predictions: &'p [ActionPrediction],
    ) -> Option<(&'p ActionPrediction, f32)> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let mut best: Option<(&ActionPrediction, f32)> = None;
        for prediction in predictions {
            let confidence = self.score(input, prediction);
            if confidence >= self.min_confidence
                && best.map_or(true, |(_, best_score)| confidence > best_score)
            {
                best = Some((prediction, confidence));
            }
        }

        if let Some((prediction, confidence)) = best {
            tracing::debug!(
                input,
                action = %prediction.action_type,
                target = prediction.target_key.as_deref().unwrap_or("-"),
                confidence,
                "input matched prediction"
            );
        }
        best
    }

    fn score(&self, input: &str, prediction: &ActionPrediction) -> f32 {
        let regex_hit = prediction.input_patterns.iter().any(|pattern| {
            Regex::new(pattern)
                .map(|re| re.is_match(input))
                .unwrap_or(false)
        });

        let jaccard = jaccard_similarity(
            &tokenize(input),
            &prediction_tokens(prediction),
        );

        if regex_hit {
            // A pattern hit is strong evidence; token overlap tops it up.
            (0.75 + 0.25 * jaccard).min(1.0)
        } else {
            jaccard
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty() && !STOPWORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}

/// Tokens describing a prediction: its verb family plus target display.
fn prediction_tokens(prediction: &ActionPrediction) -> Vec<String> {
    let verbs: &[&str] = match prediction.action_type {
        ActionType::InteractNpc => &["talk", "speak", "ask", "greet", "chat", "say"],
        ActionType::TakeItem => &["take", "grab", "pick", "get"],
        ActionType::UseItem => &["use", "open", "apply"],
        ActionType::Move => &["go", "walk", "enter", "head", "leave"],
        ActionType::Observe => &["look", "observe", "survey", "around"],
        ActionType::Attack => &["attack", "fight", "strike", "hit"],
        ActionType::Other(_) => &[],
    };
    let mut tokens: Vec<String> = verbs.iter().map(|v| v.to_string()).collect();
    if let Some(display) = &prediction.target_display {
        tokens.extend(tokenize(display));
    }
    tokens
}

fn jaccard_similarity(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: std::collections::HashSet<&str> = a.iter().map(|s| s.as_str()).collect();
    let set_b: std::collections::HashSet<&str> = b.iter().map(|s| s.as_str()).collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npc_prediction() -> ActionPrediction {
        ActionPrediction {
            action_type: ActionType::InteractNpc,
            target_key: Some("bartender_001".to_string()),
            target_display: Some("Marcus".to_string()),
            input_patterns: vec![
                r"(?i)\b(talk|speak|ask|greet|chat|say)\b.*(marcus|bartender)".to_string(),
            ],
            probability: 0.5,
            reason: String::new(),
        }
    }

    fn observe_prediction() -> ActionPrediction {
        ActionPrediction {
            action_type: ActionType::Observe,
            target_key: None,
            target_display: None,
            input_patterns: vec![
                r"(?i)^\s*(look|look around|observe|survey)\s*$".to_string(),
            ],
            probability: 0.15,
            reason: String::new(),
        }
    }

    #[test]
    fn test_greet_matches_with_high_confidence() {
        let matcher = ActionMatcher::new(0.7);
        let predictions = vec![npc_prediction(), observe_prediction()];
        let (matched, confidence) = matcher
            .match_input("greet the bartender", &predictions)
            .expect("match");
        assert_eq!(matched.action_type, ActionType::InteractNpc);
        assert!(confidence >= 0.7);
    }

    #[test]
    fn test_unrelated_input_misses() {
        let matcher = ActionMatcher::new(0.7);
        let predictions = vec![npc_prediction(), observe_prediction()];
        assert!(matcher
            .match_input("examine the rune on the wall", &predictions)
            .is_none());
    }

    #[test]
    fn test_plain_look_matches_observe() {
        let matcher = ActionMatcher::new(0.7);
        let predictions = vec![npc_prediction(), observe_prediction()];
        let (matched, _) = matcher.match_input("look around", &predictions).expect("match");
        assert_eq!(matched.action_type, ActionType::Observe);
    }

    #[test]
    fn test_empty_input_misses() {
        let matcher = ActionMatcher::new(0.7);
        assert!(matcher.match_input("   ", &[npc_prediction()]).is_none());
    }

    #[test]
    fn test_best_of_multiple_matches_wins() {
        let matcher = ActionMatcher::new(0.5);
        let mut move_prediction = ActionPrediction {
            action_type: ActionType::Move,
            target_key: Some("street".to_string()),
            target_display: Some("Harbor Street".to_string()),
            input_patterns: vec![r"(?i)\b(go|walk|head|leave)\b.*(street|out)".to_string()],
            probability: 0.3,
            reason: String::new(),
        };
        move_prediction.input_patterns.push(r"(?i)\bleave\b".to_string());

        let predictions = vec![npc_prediction(), move_prediction];
        let (matched, _) = matcher
            .match_input("leave for harbor street", &predictions)
            .expect("match");
        assert_eq!(matched.action_type, ActionType::Move);
    }
}
