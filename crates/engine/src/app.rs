//! Composition root.
//!
//! `Engine` wires the store, managers, gateway, and pipeline together for
//! one session and exposes the narrow surface front-ends consume. Tests and
//! alternative providers inject their own ports through `EngineBuilder`.

use std::sync::Arc;

use anyhow::Context;

use fateweaver_domain::SessionId;
use fateweaver_shared::{AnticipationStatus, CacheStats, TurnResult};

use crate::config::EngineConfig;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::gateway::{LlmGateway, RoleSettings};
use crate::infrastructure::openai::OpenAiClient;
use crate::infrastructure::ports::{ClockPort, LlmPort, RandomPort};
use crate::infrastructure::random::StdRandom;
use crate::infrastructure::resilient::{ResilientLlmClient, RetryConfig};
use crate::managers::Managers;
use crate::pipeline::anticipation::{
    AnticipationConfig, AnticipationHandle, AnticipationLoop, AnticipationState,
};
use crate::pipeline::cache::BranchCache;
use crate::pipeline::collapse::CollapseManager;
use crate::pipeline::generator::BranchGenerator;
use crate::pipeline::matcher::ActionMatcher;
use crate::pipeline::oracle::GmDecisionOracle;
use crate::pipeline::predictor::ActionPredictor;
use crate::pipeline::turn::TurnPipeline;
use crate::store::Store;

/// Initialise structured logging from `RUST_LOG`; safe to call repeatedly.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// A running engine bound to one session.
pub struct Engine {
    pipeline: Arc<TurnPipeline>,
    anticipation: Option<AnticipationHandle>,
    cleanup: Option<(tokio_util::sync::CancellationToken, tokio::task::JoinHandle<()>)>,
}

impl Engine {
    /// Build against the configured endpoints and database.
    pub async fn start(config: EngineConfig, session_id: SessionId) -> anyhow::Result<Self> {
        let store = Store::connect(&config.database_url)
            .await
            .context("connecting session store")?;

        let reasoning: Arc<dyn LlmPort> = Arc::new(ResilientLlmClient::new(
            Arc::new(OpenAiClient::new(
                &config.reasoning.base_url,
                &config.reasoning.model,
                config.reasoning.api_key.clone(),
                config.llm_timeout_seconds,
            )),
            RetryConfig::default(),
        ));
        let narrator: Arc<dyn LlmPort> = Arc::new(ResilientLlmClient::new(
            Arc::new(OpenAiClient::new(
                &config.narrator.base_url,
                &config.narrator.model,
                config.narrator.api_key.clone(),
                config.llm_timeout_seconds,
            )),
            RetryConfig::default(),
        ));

        EngineBuilder {
            config,
            store,
            session_id,
            reasoning,
            narrator,
            random: Arc::new(StdRandom::new()),
            clock: Arc::new(SystemClock),
        }
        .build()
        .await
    }

    /// The engine for tests and embedders that bring their own ports.
    pub fn builder(
        config: EngineConfig,
        store: Store,
        session_id: SessionId,
        reasoning: Arc<dyn LlmPort>,
        narrator: Arc<dyn LlmPort>,
        random: Arc<dyn RandomPort>,
        clock: Arc<dyn ClockPort>,
    ) -> EngineBuilder {
        EngineBuilder {
            config,
            store,
            session_id,
            reasoning,
            narrator,
            random,
            clock,
        }
    }

    /// Process one player turn. Never fails; problems are reported on the
    /// result.
    pub async fn process_turn(
        &self,
        player_input: &str,
        location_key: &str,
        turn_number: u32,
    ) -> TurnResult {
        self.pipeline
            .process_turn(player_input, location_key, turn_number)
            .await
    }

    pub async fn get_cache_stats(&self) -> CacheStats {
        self.pipeline.get_cache_stats().await
    }

    pub async fn get_anticipation_status(&self) -> AnticipationStatus {
        self.pipeline.get_anticipation_status().await
    }

    pub async fn invalidate_location(&self, location_key: &str) -> usize {
        self.pipeline.invalidate_location(location_key).await
    }

    /// Stop background tasks. Idempotent; dropping without calling this
    /// aborts the tasks less gracefully.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.anticipation.take() {
            handle.stop().await;
            self.pipeline.set_anticipation_running(false);
        }
        if let Some((token, join)) = self.cleanup.take() {
            token.cancel();
            let _ = join.await;
        }
        tracing::info!("engine shut down");
    }
}

pub struct EngineBuilder {
    pub config: EngineConfig,
    pub store: Store,
    pub session_id: SessionId,
    pub reasoning: Arc<dyn LlmPort>,
    pub narrator: Arc<dyn LlmPort>,
    pub random: Arc<dyn RandomPort>,
    pub clock: Arc<dyn ClockPort>,
}

impl EngineBuilder {
    pub async fn build(self) -> anyhow::Result<Engine> {
        let config = self.config;

        let gateway = Arc::new(LlmGateway::new(
            self.reasoning,
            self.narrator,
            RoleSettings {
                temperature: config.reasoning.temperature,
                max_tokens: config.llm_max_tokens,
            },
            RoleSettings {
                temperature: config.narrator.temperature,
                max_tokens: config.llm_max_tokens,
            },
        ));

        let managers = Arc::new(Managers::new(self.session_id, Arc::clone(&self.random)));
        let predictor = Arc::new(ActionPredictor::new(config.max_actions_per_cycle));
        let oracle = Arc::new(GmDecisionOracle::new(config.max_gm_decisions));
        let generator = Arc::new(BranchGenerator::new(
            Arc::clone(&gateway),
            config.generation_max_retries,
        ));
        let cache = Arc::new(BranchCache::new(config.cache_size, config.cache_ttl));
        let matcher = ActionMatcher::new(config.min_match_confidence);
        let collapse = CollapseManager::new(
            self.store.clone(),
            self.session_id,
            Arc::clone(&self.random),
            Arc::clone(&self.clock),
        );
        let anticipation_state = Arc::new(AnticipationState::new());

        let pipeline = Arc::new(TurnPipeline::new(
            self.store.clone(),
            self.session_id,
            Arc::clone(&managers),
            Arc::clone(&predictor),
            Arc::clone(&oracle),
            Arc::clone(&generator),
            matcher,
            Arc::clone(&cache),
            collapse,
            Arc::clone(&self.clock),
            Arc::clone(&anticipation_state),
        ));

        let cleanup_token = tokio_util::sync::CancellationToken::new();
        let cleanup_join =
            cache.spawn_cleanup(config.cache_cleanup_interval, cleanup_token.clone());

        let anticipation = if config.anticipation_enabled {
            let anticipation_loop = AnticipationLoop::new(
                self.store.clone(),
                self.session_id,
                Arc::clone(&managers),
                Arc::clone(&predictor),
                Arc::clone(&oracle),
                Arc::clone(&generator),
                Arc::clone(&cache),
                Arc::clone(&anticipation_state),
                AnticipationConfig {
                    enabled: true,
                    max_actions_per_cycle: config.max_actions_per_cycle,
                    max_gm_decisions_per_action: config.max_gm_decisions,
                    cycle_delay: config.cycle_delay,
                    generation_fanout: config.generation_fanout,
                    history_window: 5,
                },
            );
            let handle = anticipation_loop.start();
            pipeline.set_anticipation_running(true);
            Some(handle)
        } else {
            None
        };

        Ok(Engine {
            pipeline,
            anticipation,
            cleanup: Some((cleanup_token, cleanup_join)),
        })
    }
}
