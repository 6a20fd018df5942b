//! Turn processing: the pipeline entry point.
//!
//! `process_turn` never fails: it tries the cached path (match -> cache ->
//! collapse), falls back to synchronous generation, and as a last resort
//! emits a minimal grounded narrative so the session always continues.
//! Errors accumulate on the returned `TurnResult`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use fateweaver_domain::{
    ActionPrediction, ActionType, BranchKey, GmDecision, LocationKey, SessionId, SubjectType,
    TurnRecord,
};
use fateweaver_shared::{AnticipationStatus, CacheStats, StateChange, TurnError, TurnResult};

use crate::infrastructure::ports::ClockPort;
use crate::managers::Managers;
use crate::pipeline::anticipation::AnticipationState;
use crate::pipeline::cache::BranchCache;
use crate::pipeline::collapse::{CollapseError, CollapseManager, CollapseOutcome};
use crate::pipeline::generator::BranchGenerator;
use crate::pipeline::matcher::ActionMatcher;
use crate::pipeline::oracle::GmDecisionOracle;
use crate::pipeline::predictor::{ActionPredictor, ARRIVED_TURN_PREDICATE};
use crate::scene::ManifestBuilder;
use crate::store::{self, Store};

/// Turns of history fed to prediction and generation.
const HISTORY_WINDOW: u32 = 5;

pub struct TurnPipeline {
    store: Store,
    session_id: SessionId,
    managers: Arc<Managers>,
    predictor: Arc<ActionPredictor>,
    oracle: Arc<GmDecisionOracle>,
    generator: Arc<BranchGenerator>,
    matcher: ActionMatcher,
    cache: Arc<BranchCache>,
    collapse: CollapseManager,
    clock: Arc<dyn ClockPort>,
    anticipation_state: Arc<AnticipationState>,
    anticipation_running: std::sync::atomic::AtomicBool,
}

impl TurnPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        session_id: SessionId,
        managers: Arc<Managers>,
        predictor: Arc<ActionPredictor>,
        oracle: Arc<GmDecisionOracle>,
        generator: Arc<BranchGenerator>,
        matcher: ActionMatcher,
        cache: Arc<BranchCache>,
        collapse: CollapseManager,
        clock: Arc<dyn ClockPort>,
        anticipation_state: Arc<AnticipationState>,
    ) -> Self {
        Self {
            store,
            session_id,
            managers,
            predictor,
            oracle,
            generator,
            matcher,
            cache,
            collapse,
            clock,
            anticipation_state,
            anticipation_running: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Process one player turn. Always returns a populated `TurnResult`.
    pub async fn process_turn(
        &self,
        player_input: &str,
        location_key: &str,
        turn_number: u32,
    ) -> TurnResult {
        let started = Instant::now();
        let mut errors = Vec::new();

        match self
            .try_process(player_input, location_key, turn_number, &mut errors)
            .await
        {
            Ok((outcome, was_cache_hit)) => {
                self.note_location(location_key, turn_number).await;
                TurnResult {
                    narrative: outcome.display_narrative,
                    raw_narrative: outcome.raw_narrative,
                    was_cache_hit,
                    latency_ms: started.elapsed().as_millis() as u64,
                    dice_result: outcome.dice_result,
                    state_changes: outcome
                        .state_changes
                        .into_iter()
                        .map(|change| StateChange {
                            kind: change.kind.to_string(),
                            target: change.target,
                            summary: change.summary,
                        })
                        .collect(),
                    time_passed_minutes: outcome.time_passed_minutes,
                    errors,
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "turn failed all paths, using narrator fallback");
                errors.push(TurnError::new("fallback", err.to_string()));
                let result = self
                    .fallback_turn(player_input, location_key, turn_number, started, errors)
                    .await;
                self.note_location(location_key, turn_number).await;
                result
            }
        }
    }

    async fn try_process(
        &self,
        player_input: &str,
        location_key: &str,
        turn_number: u32,
        errors: &mut Vec<TurnError>,
    ) -> anyhow::Result<(CollapseOutcome, bool)> {
        let mut conn = self.store.pool().acquire().await?;
        let session = store::sessions::get(&mut conn, self.session_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("session missing"))?;
        let player_key = session.player_entity.as_str().to_string();
        let setting = session.setting.clone();
        let state_version = session.state_version;

        let manifest =
            ManifestBuilder::build(&mut conn, &self.managers, location_key, &player_key).await?;
        let recent = store::turns::recent(
            &mut conn,
            &self.session_id.to_string(),
            HISTORY_WINDOW,
        )
        .await?;

        let predictions = self
            .predictor
            .predict(&mut conn, &self.managers, &manifest, &recent)
            .await?;
        let matched = self.matcher.match_input(player_input, &predictions);

        // Cached path. Topic-carrying NPC dialogue ("ask about the rumors")
        // cannot be served from a branch generated before the topic was
        // known; generic interactions (a plain greet) can.
        if let Some((prediction, confidence)) = &matched {
            let topic_sensitive = prediction.action_type == ActionType::InteractNpc
                && is_topic_sensitive(player_input);
            if !topic_sensitive {
                let key = BranchKey::new(
                    LocationKey::new(location_key)?,
                    prediction.action_type.clone(),
                    prediction.target_key.clone(),
                    GmDecision::NO_TWIST,
                );
                if let Some(branch) = self.cache.get(&key, state_version).await {
                    drop(conn);
                    match self
                        .collapse
                        .collapse(&self.managers, &branch, player_input, turn_number)
                        .await
                    {
                        Ok(outcome) => {
                            tracing::info!(
                                branch = %branch.key,
                                confidence,
                                "turn served from cache"
                            );
                            return Ok((outcome, true));
                        }
                        Err(CollapseError::StaleState) => {
                            errors.push(TurnError::new(
                                "stale_state",
                                "cached branch was stale, regenerating",
                            ));
                            self.cache.invalidate_location(location_key).await;
                        }
                        Err(other) => {
                            errors.push(TurnError::new("collapse_failed", other.to_string()));
                        }
                    }
                    conn = self.store.pool().acquire().await?;
                }
            }
        }

        // Sync path: generate with the actual player input, then collapse.
        let action = matched
            .map(|(prediction, _)| prediction.clone())
            .unwrap_or_else(|| default_action(player_input));
        // Freshness for the sync branch: read the version that the branch
        // will be collapsed against.
        let state_version = store::sessions::state_version(&mut conn, self.session_id).await?;

        let branch = match self
            .generator
            .generate(
                &mut conn,
                &self.managers,
                &manifest,
                &setting,
                &action,
                &GmDecision::no_twist(),
                &recent,
                Some(player_input),
                state_version,
            )
            .await
        {
            Ok(branch) => branch,
            // Structured generation kept failing validation; the tool-loop
            // path narrates freely and maps tool calls to deltas.
            Err(crate::pipeline::generator::GeneratorError::Validation(feedback)) => {
                errors.push(TurnError::new("validation_failed", feedback));
                self.generator
                    .generate_via_tools(
                        &mut conn,
                        &self.managers,
                        &manifest,
                        &setting,
                        &action,
                        &recent,
                        player_input,
                        state_version,
                    )
                    .await?
            }
            Err(other) => return Err(other.into()),
        };
        drop(conn);

        let outcome = self
            .collapse
            .collapse(&self.managers, &branch, player_input, turn_number)
            .await?;
        Ok((outcome, false))
    }

    /// Last-resort path: a minimal grounded line, recorded as a real turn so
    /// the session keeps its invariants (turn log grows, version bumps).
    async fn fallback_turn(
        &self,
        player_input: &str,
        location_key: &str,
        turn_number: u32,
        started: Instant,
        errors: Vec<TurnError>,
    ) -> TurnResult {
        let raw_narrative = self
            .fallback_narrative(location_key)
            .await
            .unwrap_or_else(|| "You take a breath and get your bearings.".to_string());
        let display = fateweaver_domain::strip_refs(&raw_narrative);

        if let Err(err) = self
            .record_fallback_turn(player_input, &raw_narrative, turn_number)
            .await
        {
            tracing::error!(error = %err, "failed to record fallback turn");
        }

        TurnResult {
            narrative: display,
            raw_narrative,
            was_cache_hit: false,
            latency_ms: started.elapsed().as_millis() as u64,
            dice_result: None,
            state_changes: vec![],
            time_passed_minutes: 0,
            errors,
        }
    }

    async fn fallback_narrative(&self, location_key: &str) -> Option<String> {
        let mut conn = self.store.pool().acquire().await.ok()?;
        let location = self
            .managers
            .locations
            .get(&mut conn, location_key)
            .await
            .ok()?;
        Some(format!(
            "You pause and take in [{}:{}]. Nothing demands your attention just yet.",
            location.key, location.display_name
        ))
    }

    async fn record_fallback_turn(
        &self,
        player_input: &str,
        raw_narrative: &str,
        turn_number: u32,
    ) -> anyhow::Result<()> {
        let mut tx = self.store.begin().await?;
        store::turns::insert(
            &mut tx,
            &self.session_id.to_string(),
            &TurnRecord {
                turn_number,
                player_input: player_input.to_string(),
                gm_response: raw_narrative.to_string(),
                mentioned_items: vec![],
                is_ooc: false,
                created_at: self.clock.now(),
            },
        )
        .await?;
        store::sessions::bump_state_version(&mut tx, self.session_id).await?;
        store::sessions::increment_turns(&mut tx, self.session_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Track the player's location for the anticipation loop and the
    /// exploration bonus; invalidates the old scene lazily.
    async fn note_location(&self, location_key: &str, turn_number: u32) {
        let mut guard = self.anticipation_state.current_location.write().await;
        let previous = guard.clone();
        if previous.as_deref() != Some(location_key) {
            *guard = Some(location_key.to_string());
            drop(guard);

            if let Some(previous) = previous {
                self.cache.invalidate_location(&previous).await;
            }
            if let Ok(mut conn) = self.store.pool().acquire().await {
                let fact = fateweaver_domain::Fact {
                    subject_type: SubjectType::Location,
                    subject_key: location_key.to_string(),
                    predicate: ARRIVED_TURN_PREDICATE.to_string(),
                    value: turn_number.to_string(),
                    is_secret: true,
                    certainty: 1.0,
                    recorded_turn: turn_number,
                };
                if let Err(err) = self
                    .managers
                    .facts
                    .apply(&mut conn, &fact, fateweaver_domain::DeltaOperation::Update)
                    .await
                {
                    tracing::debug!(error = %err, "failed to record arrival turn");
                }
            }
        }
    }

    // =========================================================================
    // API surface consumed by front-ends
    // =========================================================================

    pub async fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn set_anticipation_running(&self, running: bool) {
        self.anticipation_running.store(running, Ordering::Relaxed);
    }

    pub async fn get_anticipation_status(&self) -> AnticipationStatus {
        AnticipationStatus {
            running: self.anticipation_running.load(Ordering::Relaxed),
            branches_generated: self
                .anticipation_state
                .branches_generated
                .load(Ordering::Relaxed),
            current_location: self.anticipation_state.current_location.read().await.clone(),
        }
    }

    pub async fn invalidate_location(&self, location_key: &str) -> usize {
        self.cache.invalidate_location(location_key).await
    }
}

/// Fallback action when no prediction matched: treat the input as a
/// free-form observation/interaction.
fn default_action(player_input: &str) -> ActionPrediction {
    let mut action = ActionPrediction::new(ActionType::Other("freeform".to_string()), 0.1);
    action.reason = format!("unmatched input: {}", player_input);
    action
}

/// Whether dialogue input carries a topic a pre-generated branch could not
/// have known about.
fn is_topic_sensitive(input: &str) -> bool {
    let lower = input.to_lowercase();
    lower.contains(" about ")
        || lower.contains('"')
        || lower.contains('?')
        || lower.split_whitespace().count() > 6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_sensitivity() {
        assert!(!is_topic_sensitive("greet the bartender"));
        assert!(!is_topic_sensitive("talk to marcus"));
        assert!(is_topic_sensitive("ask marcus about the rumors"));
        assert!(is_topic_sensitive("say \"where were you last night\" to marcus"));
        assert!(is_topic_sensitive(
            "walk over to marcus and quietly ask him to hide me"
        ));
    }
}
