//! Collapse manager: turns a branch into one concrete outcome.
//!
//! Ordered steps inside a single transaction: freshness check, variant
//! selection (dice at observation time), delta revalidation against live
//! state, atomic apply through the managers, key stripping, turn record.
//! Any failure rolls the transaction back and surfaces an explicit error
//! variant; the turn pipeline decides whether to fall back to the sync
//! path.

use std::sync::Arc;

use sqlx::SqliteConnection;
use thiserror::Error;

use fateweaver_domain::{
    skill_check, strip_refs, ActivityClass, Advantage, CheckResult, QuantumBranch, SessionId,
    Skill, TurnRecord, VariantName,
};

use crate::infrastructure::ports::{ClockPort, RandomPort};
use crate::managers::{AppliedChange, DeltaApplier, ManagerError, Managers};
use crate::pipeline::validators::{self, DeltaValidator};
use crate::store::{self, Store, StoreError};

#[derive(Debug, Error)]
pub enum CollapseError {
    /// The branch was generated against an older state version, or its
    /// deltas no longer match live state.
    #[error("branch is stale")]
    StaleState,

    /// A manager rejected a delta mid-apply; everything was rolled back.
    #[error("delta application failed: {0}")]
    Apply(#[from] ManagerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// The collapsed outcome of one turn.
#[derive(Debug, Clone)]
pub struct CollapseOutcome {
    pub display_narrative: String,
    pub raw_narrative: String,
    pub variant: VariantName,
    pub state_changes: Vec<AppliedChange>,
    pub time_passed_minutes: u32,
    pub dice_result: Option<CheckResult>,
    pub state_version: u64,
}

pub struct CollapseManager {
    store: Store,
    session_id: SessionId,
    random: Arc<dyn RandomPort>,
    clock: Arc<dyn ClockPort>,
}

impl CollapseManager {
    pub fn new(
        store: Store,
        session_id: SessionId,
        random: Arc<dyn RandomPort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            store,
            session_id,
            random,
            clock,
        }
    }

    /// Collapse a branch for the given player input and turn number.
    pub async fn collapse(
        &self,
        managers: &Managers,
        branch: &QuantumBranch,
        player_input: &str,
        turn_number: u32,
    ) -> Result<CollapseOutcome, CollapseError> {
        let mut tx = self.store.begin().await?;

        // 1. Freshness: the branch must match the session's state version.
        let current_version =
            store::sessions::state_version(&mut tx, self.session_id).await?;
        if branch.state_version != current_version {
            tracing::info!(
                branch = %branch.key,
                branch_version = branch.state_version,
                current_version,
                "stale branch rejected"
            );
            tx.rollback().await.map_err(StoreError::from)?;
            return Err(CollapseError::StaleState);
        }

        // 2. Variant selection: dice at observation time.
        let dice_result = match branch.dice_parameters() {
            Some((skill, dc)) => Some(
                self.roll_check(&mut tx, managers, branch, skill, dc)
                    .await?,
            ),
            None => None,
        };
        let (variant_name, variant) = match &dice_result {
            Some(check) => branch.select_variant(check),
            None => {
                let success = branch
                    .variants
                    .get(&VariantName::Success)
                    .ok_or(CollapseError::StaleState)?;
                (VariantName::Success, success)
            }
        };

        // 3. Revalidate every delta of the chosen variant against live state.
        for delta in &variant.state_deltas {
            let issues = DeltaValidator::validate(&mut tx, managers, delta).await?;
            if validators::has_errors(&issues) {
                tracing::info!(
                    branch = %branch.key,
                    variant = variant_name.as_str(),
                    issues = validators::feedback(&issues),
                    "delta revalidation failed, branch stale"
                );
                tx.rollback().await.map_err(StoreError::from)?;
                return Err(CollapseError::StaleState);
            }
        }

        // 4. Atomic apply. Any manager error rolls everything back.
        let applier = DeltaApplier::new(managers);
        let mut state_changes = Vec::new();
        for delta in &variant.state_deltas {
            match applier.apply(&mut tx, delta, turn_number).await {
                Ok(change) => {
                    store::sessions::bump_state_version(&mut tx, self.session_id).await?;
                    state_changes.push(change);
                }
                Err(err) => {
                    tracing::warn!(
                        branch = %branch.key,
                        delta = delta.kind_str(),
                        error = %err,
                        "delta apply failed, rolling back turn"
                    );
                    tx.rollback().await.map_err(StoreError::from)?;
                    return Err(CollapseError::Apply(err));
                }
            }
        }

        if variant.time_passed_minutes > 0 {
            managers
                .time
                .advance(
                    &mut tx,
                    variant.time_passed_minutes,
                    ActivityClass::Idle,
                    &managers.needs,
                )
                .await?;
        }

        // 5. Key stripping.
        let raw_narrative = variant.narrative.clone();
        let display_narrative = strip_refs(&raw_narrative);

        // 6. Turn record plus counters; the turn itself always bumps the
        // state version at least once.
        let mentioned_items = self.mentioned_items(&mut tx, &raw_narrative).await?;
        store::turns::insert(
            &mut tx,
            &self.session_id.to_string(),
            &TurnRecord {
                turn_number,
                player_input: player_input.to_string(),
                gm_response: raw_narrative.clone(),
                mentioned_items,
                is_ooc: false,
                created_at: self.clock.now(),
            },
        )
        .await?;
        let state_version =
            store::sessions::bump_state_version(&mut tx, self.session_id).await?;
        store::sessions::increment_turns(&mut tx, self.session_id).await?;

        tx.commit().await.map_err(StoreError::from)?;

        Ok(CollapseOutcome {
            display_narrative,
            raw_narrative,
            variant: variant_name,
            state_changes,
            time_passed_minutes: variant.time_passed_minutes,
            dice_result,
            state_version,
        })
    }

    /// Roll the branch's check, inferring disadvantage on social skills when
    /// a hostile NPC is present.
    async fn roll_check(
        &self,
        conn: &mut SqliteConnection,
        managers: &Managers,
        branch: &QuantumBranch,
        skill: Skill,
        dc: i32,
    ) -> Result<CheckResult, CollapseError> {
        let session = store::sessions::get(conn, self.session_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        let player = managers
            .entities
            .get(conn, session.player_entity.as_str())
            .await?;
        let modifier = player.check_modifier(&skill);

        let advantage = if skill.is_social()
            && self
                .hostile_npc_present(conn, managers, branch, session.player_entity.as_str())
                .await?
        {
            Advantage::Disadvantage
        } else {
            Advantage::Normal
        };

        let random = Arc::clone(&self.random);
        let mut roll = || random.gen_range(1, 10) as u8;
        let result = skill_check(skill, dc, modifier, advantage, &mut roll);
        tracing::debug!(
            branch = %branch.key,
            result = result.breakdown(),
            tier = ?result.tier,
            "dice rolled"
        );
        Ok(result)
    }

    async fn hostile_npc_present(
        &self,
        conn: &mut SqliteConnection,
        managers: &Managers,
        branch: &QuantumBranch,
        player_key: &str,
    ) -> Result<bool, CollapseError> {
        let npcs = managers
            .entities
            .list_active_at_location(conn, branch.key.location.as_str())
            .await?;
        for npc in npcs {
            if !npc.is_alive {
                continue;
            }
            let attitude = managers
                .relationships
                .attitude(conn, npc.key.as_str(), player_key)
                .await?;
            if attitude.is_hostile() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Item keys referenced in the narrative that exist in the session.
    async fn mentioned_items(
        &self,
        conn: &mut SqliteConnection,
        narrative: &str,
    ) -> Result<Vec<String>, CollapseError> {
        let mut mentioned = Vec::new();
        for tag in fateweaver_domain::parse_refs(narrative) {
            if store::items::get(conn, &self.session_id.to_string(), &tag.key)
                .await?
                .is_some()
            {
                mentioned.push(tag.key);
            }
        }
        Ok(mentioned)
    }
}
