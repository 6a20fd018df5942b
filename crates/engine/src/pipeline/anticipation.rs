//! Anticipation loop: background branch pre-generation.
//!
//! A cooperative task that continuously tops up the cache for the current
//! scene while the player reads. It owns nothing but its config and handles;
//! stop() cancels it cleanly and the loop is fully restartable. NPC branches
//! are anticipated as generic interactions; the turn pipeline refuses to
//! serve them for topic-carrying dialogue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use fateweaver_domain::{ActionPrediction, BranchKey, GmDecision, LocationKey};

use crate::managers::Managers;
use crate::pipeline::cache::BranchCache;
use crate::pipeline::generator::BranchGenerator;
use crate::pipeline::oracle::GmDecisionOracle;
use crate::pipeline::predictor::ActionPredictor;
use crate::scene::ManifestBuilder;
use crate::store::{self, Store};

/// Tuning for the anticipation loop.
#[derive(Debug, Clone)]
pub struct AnticipationConfig {
    pub enabled: bool,
    pub max_actions_per_cycle: usize,
    pub max_gm_decisions_per_action: usize,
    pub cycle_delay: Duration,
    /// Concurrent branch generations per cycle.
    pub generation_fanout: usize,
    /// Turns of history fed into generation context.
    pub history_window: u32,
}

impl Default for AnticipationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_actions_per_cycle: 5,
            max_gm_decisions_per_action: 2,
            cycle_delay: Duration::from_millis(500),
            generation_fanout: 3,
            history_window: 5,
        }
    }
}

/// Shared state between the loop and the pipeline.
pub struct AnticipationState {
    /// The player's current location; None before the first turn.
    pub current_location: RwLock<Option<String>>,
    pub branches_generated: AtomicU64,
}

impl AnticipationState {
    pub fn new() -> Self {
        Self {
            current_location: RwLock::new(None),
            branches_generated: AtomicU64::new(0),
        }
    }
}

impl Default for AnticipationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running anticipation loop.
pub struct AnticipationHandle {
    token: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl AnticipationHandle {
    /// Stop the loop and wait for it to wind down.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.join.await;
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

pub struct AnticipationLoop {
    store: Store,
    session_id: fateweaver_domain::SessionId,
    managers: Arc<Managers>,
    predictor: Arc<ActionPredictor>,
    oracle: Arc<GmDecisionOracle>,
    generator: Arc<BranchGenerator>,
    cache: Arc<BranchCache>,
    state: Arc<AnticipationState>,
    config: AnticipationConfig,
}

impl AnticipationLoop {
    pub fn new(
        store: Store,
        session_id: fateweaver_domain::SessionId,
        managers: Arc<Managers>,
        predictor: Arc<ActionPredictor>,
        oracle: Arc<GmDecisionOracle>,
        generator: Arc<BranchGenerator>,
        cache: Arc<BranchCache>,
        state: Arc<AnticipationState>,
        config: AnticipationConfig,
    ) -> Self {
        Self {
            store,
            session_id,
            managers,
            predictor,
            oracle,
            generator,
            cache,
            state,
            config,
        }
    }

    /// Spawn the loop; it runs until the returned handle is stopped.
    pub fn start(self) -> AnticipationHandle {
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let join = tokio::spawn(async move {
            tracing::info!("anticipation loop started");
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = self.run_cycle() => {}
                }
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep(self.config.cycle_delay) => {}
                }
            }
            tracing::info!("anticipation loop stopped");
        });
        AnticipationHandle { token, join }
    }

    /// One anticipation pass; errors are logged and swallowed so the loop
    /// survives transient failures.
    async fn run_cycle(&self) {
        if let Err(err) = self.try_cycle().await {
            tracing::warn!(error = %err, "anticipation cycle failed");
        }
    }

    async fn try_cycle(&self) -> anyhow::Result<()> {
        let Some(location_key) = self.state.current_location.read().await.clone() else {
            return Ok(());
        };

        let mut conn = self.store.pool().acquire().await?;
        let session = store::sessions::get(&mut conn, self.session_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("session missing"))?;
        let manifest = ManifestBuilder::build(
            &mut conn,
            &self.managers,
            &location_key,
            session.player_entity.as_str(),
        )
        .await?;
        let recent = store::turns::recent(
            &mut conn,
            &self.session_id.to_string(),
            self.config.history_window,
        )
        .await?;

        let predictions = self
            .predictor
            .predict(&mut conn, &self.managers, &manifest, &recent)
            .await?;

        // (action, decision) pairs not yet cached.
        let mut work: Vec<(ActionPrediction, GmDecision)> = Vec::new();
        for prediction in predictions.into_iter() {
            let decisions = self
                .oracle
                .decisions(&mut conn, &self.managers, &location_key, &prediction)
                .await?;
            for decision in decisions
                .into_iter()
                .take(self.config.max_gm_decisions_per_action)
            {
                let key = BranchKey::new(
                    LocationKey::new(location_key.clone())?,
                    prediction.action_type.clone(),
                    prediction.target_key.clone(),
                    decision.key.clone(),
                );
                if !self.cache.contains(&key).await {
                    work.push((prediction.clone(), decision));
                }
            }
        }
        drop(conn);

        if work.is_empty() {
            return Ok(());
        }

        let state_version = session.state_version;
        let setting = session.setting.clone();

        // Bounded fan-out; each generation takes its own connection.
        let results: Vec<_> = stream::iter(work)
            .map(|(action, decision)| {
                let manifest = manifest.clone();
                let recent = recent.clone();
                let setting = setting.clone();
                async move {
                    let mut conn = self.store.pool().acquire().await.ok()?;
                    self.generator
                        .generate(
                            &mut conn,
                            &self.managers,
                            &manifest,
                            &setting,
                            &action,
                            &decision,
                            &recent,
                            None,
                            state_version,
                        )
                        .await
                        .map_err(|err| {
                            tracing::debug!(error = %err, "anticipated generation failed");
                            err
                        })
                        .ok()
                }
            })
            .buffer_unordered(self.config.generation_fanout)
            .collect()
            .await;

        for branch in results.into_iter().flatten() {
            // The player may have moved mid-generation; discard results for
            // a scene no longer current.
            let still_current = self
                .state
                .current_location
                .read()
                .await
                .as_deref()
                .is_some_and(|current| current == branch.key.location.as_str());
            if !still_current {
                tracing::debug!(branch = %branch.key, "discarding branch for left scene");
                continue;
            }
            self.cache.insert(branch).await;
            self.state.branches_generated.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }
}
