//! Engine configuration from environment variables.
//!
//! Every option has a typed default; unparsable values fall back rather
//! than erroring, so a stray env var never stops a session from starting.

use std::time::Duration;

/// One LLM endpoint role.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
}

/// Full engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,

    pub reasoning: EndpointConfig,
    /// Narrator endpoint; defaults to the reasoning endpoint when unset.
    pub narrator: EndpointConfig,
    pub llm_max_tokens: u32,
    pub llm_timeout_seconds: u64,

    pub anticipation_enabled: bool,
    pub max_actions_per_cycle: usize,
    pub max_gm_decisions: usize,
    pub cycle_delay: Duration,

    pub min_match_confidence: f32,

    pub cache_size: usize,
    pub cache_ttl: Duration,
    pub cache_cleanup_interval: Duration,

    pub generation_max_retries: u32,
    pub generation_fanout: usize,
}

pub const DEFAULT_REASONING_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen3:32b";

impl Default for EngineConfig {
    fn default() -> Self {
        let reasoning = EndpointConfig {
            base_url: DEFAULT_REASONING_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: 0.3,
        };
        let narrator = EndpointConfig {
            temperature: 0.8,
            ..reasoning.clone()
        };
        Self {
            database_url: "sqlite://fateweaver.db".to_string(),
            reasoning,
            narrator,
            llm_max_tokens: 2048,
            llm_timeout_seconds: 120,
            anticipation_enabled: true,
            max_actions_per_cycle: 5,
            max_gm_decisions: 2,
            cycle_delay: Duration::from_millis(500),
            min_match_confidence: 0.7,
            cache_size: 50,
            cache_ttl: Duration::from_secs(180),
            cache_cleanup_interval: Duration::from_secs(60),
            generation_max_retries: 2,
            generation_fanout: 3,
        }
    }
}

impl EngineConfig {
    /// Read configuration from the environment (after loading `.env`).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let reasoning = EndpointConfig {
            base_url: var_or("REASONING_BASE_URL", defaults.reasoning.base_url),
            model: var_or("REASONING_MODEL", defaults.reasoning.model),
            api_key: std::env::var("REASONING_API_KEY").ok(),
            temperature: parse_or("REASONING_TEMPERATURE", defaults.reasoning.temperature),
        };
        // Narrator falls back to the reasoning endpoint.
        let narrator = EndpointConfig {
            base_url: var_or("NARRATOR_BASE_URL", reasoning.base_url.clone()),
            model: var_or("NARRATOR_MODEL", reasoning.model.clone()),
            api_key: std::env::var("NARRATOR_API_KEY")
                .ok()
                .or_else(|| reasoning.api_key.clone()),
            temperature: parse_or("NARRATOR_TEMPERATURE", defaults.narrator.temperature),
        };

        Self {
            database_url: var_or("DATABASE_URL", defaults.database_url),
            reasoning,
            narrator,
            llm_max_tokens: parse_or("LLM_MAX_TOKENS", defaults.llm_max_tokens),
            llm_timeout_seconds: parse_or("LLM_TIMEOUT_SECONDS", defaults.llm_timeout_seconds),
            anticipation_enabled: parse_or("ANTICIPATION_ENABLED", defaults.anticipation_enabled),
            max_actions_per_cycle: parse_or(
                "MAX_ACTIONS_PER_CYCLE",
                defaults.max_actions_per_cycle,
            ),
            max_gm_decisions: parse_or("MAX_GM_DECISIONS", defaults.max_gm_decisions),
            cycle_delay: Duration::from_secs_f64(parse_or("CYCLE_DELAY_SECONDS", 0.5)),
            min_match_confidence: parse_or(
                "MIN_MATCH_CONFIDENCE",
                defaults.min_match_confidence,
            ),
            cache_size: parse_or("CACHE_SIZE", defaults.cache_size),
            cache_ttl: Duration::from_secs(parse_or("CACHE_TTL", 180)),
            cache_cleanup_interval: Duration::from_secs(parse_or("CACHE_CLEANUP_INTERVAL", 60)),
            generation_max_retries: parse_or(
                "GENERATION_MAX_RETRIES",
                defaults.generation_max_retries,
            ),
            generation_fanout: parse_or("GENERATION_FANOUT", defaults.generation_fanout),
        }
    }
}

fn var_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_size, 50);
        assert_eq!(config.cache_ttl, Duration::from_secs(180));
        assert_eq!(config.min_match_confidence, 0.7);
        assert_eq!(config.max_actions_per_cycle, 5);
        assert!(config.anticipation_enabled);
    }

    #[test]
    fn test_narrator_runs_hotter_than_reasoning() {
        let config = EngineConfig::default();
        assert!(config.narrator.temperature > config.reasoning.temperature);
    }
}
