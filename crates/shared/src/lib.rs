//! Contract types for front-ends driving the turn pipeline.
//!
//! The engine's public surface (`process_turn`, cache stats, anticipation
//! status) speaks these serializable types. Front-ends never see store rows
//! or branches, only results.

use serde::{Deserialize, Serialize};

use fateweaver_domain::checks::CheckResult;

/// One applied state change, summarized for display and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    /// Delta kind, e.g. "relationship", "item", "satisfy_need".
    pub kind: String,
    /// Primary key the change touched.
    pub target: String,
    /// Short human-readable description.
    pub summary: String,
}

/// A non-fatal problem that occurred while processing a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnError {
    /// Stable error code, e.g. "stale_state", "llm_unavailable".
    pub code: String,
    pub message: String,
}

impl TurnError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The result of processing one player turn.
///
/// `process_turn` never fails outright: `narrative` is always populated and
/// problems accumulate in `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    /// Display narrative with reference tags stripped.
    pub narrative: String,
    /// Narrative as generated, tags intact (what the turn log stores).
    pub raw_narrative: String,
    pub was_cache_hit: bool,
    pub latency_ms: u64,
    pub dice_result: Option<CheckResult>,
    pub state_changes: Vec<StateChange>,
    pub time_passed_minutes: u32,
    pub errors: Vec<TurnError>,
}

/// Branch cache counters exposed to front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub stale_evictions: u64,
    pub invalidations: u64,
}

impl CacheStats {
    /// Hit rate over all lookups, 0.0 when nothing was looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Status of the background anticipation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnticipationStatus {
    pub running: bool,
    pub branches_generated: u64,
    pub current_location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_empty() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_turn_result_serializes_camel_case() {
        let result = TurnResult {
            narrative: "Marcus nods.".to_string(),
            raw_narrative: "[bartender_001:Marcus] nods.".to_string(),
            was_cache_hit: true,
            latency_ms: 12,
            dice_result: None,
            state_changes: vec![],
            time_passed_minutes: 1,
            errors: vec![],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["wasCacheHit"], true);
        assert_eq!(json["latencyMs"], 12);
    }
}
