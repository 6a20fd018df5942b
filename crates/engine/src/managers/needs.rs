//! Needs manager.
//!
//! Needs change only through this manager: satisfy deltas from collapsed
//! branches, and decay driven by the time manager. No keyword detection on
//! prose.

use sqlx::SqliteConnection;

use fateweaver_domain::{ActivityClass, CharacterNeeds, NeedKind, SatisfyQuality, SubjectType};

use crate::store::{entities, facts, needs};

use super::ManagerError;

/// Base satisfaction applied for an adequate-quality activity.
const BASE_SATISFY_AMOUNT: f32 = 30.0;

/// Craving build-up per hour while a need sits below the threshold.
const CRAVING_PER_HOUR: f32 = 2.0;
const CRAVING_THRESHOLD: f32 = 35.0;

pub struct NeedsManager {
    session_id: String,
}

impl NeedsManager {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    /// Needs for an entity, creating the fresh row on first touch.
    pub async fn get_or_init(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
    ) -> Result<CharacterNeeds, ManagerError> {
        if entities::get(conn, &self.session_id, entity_key)
            .await?
            .is_none()
        {
            return Err(ManagerError::not_found("Entity", entity_key));
        }
        match needs::get(conn, &self.session_id, entity_key).await? {
            Some(existing) => Ok(existing),
            None => {
                let fresh = CharacterNeeds::fresh();
                needs::upsert(conn, &self.session_id, entity_key, &fresh).await?;
                Ok(fresh)
            }
        }
    }

    /// Per-character multiplier for satisfying a need, read from facts
    /// (e.g. `greedy_eater` doubles food satisfaction).
    async fn character_multiplier(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
        need: NeedKind,
    ) -> Result<f32, ManagerError> {
        let modifier_predicate = match need {
            NeedKind::Hunger => "greedy_eater",
            NeedKind::Fun => "easily_amused",
            NeedKind::Social => "gregarious",
            _ => return Ok(1.0),
        };
        let fact = facts::find(
            conn,
            &self.session_id,
            SubjectType::Entity,
            entity_key,
            modifier_predicate,
        )
        .await?;
        Ok(if fact.is_some() { 1.5 } else { 1.0 })
    }

    /// Apply a `(need, activity, quality)` satisfy delta.
    pub async fn satisfy(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
        need: NeedKind,
        activity: &str,
        quality: SatisfyQuality,
    ) -> Result<f32, ManagerError> {
        let mut state = self.get_or_init(conn, entity_key).await?;
        let multiplier = self
            .character_multiplier(conn, entity_key, need)
            .await?;
        let amount = BASE_SATISFY_AMOUNT * quality.multiplier() * multiplier;

        state.adjust(need, amount);
        // A satisfied need resets its craving.
        state.cravings.insert(need, 0.0);
        needs::upsert(conn, &self.session_id, entity_key, &state).await?;

        tracing::debug!(
            entity = entity_key,
            need = %need,
            activity,
            amount,
            "need satisfied"
        );
        Ok(amount)
    }

    /// Decay all needs for elapsed game time; cravings build for needs left
    /// low. Invoked by the time manager.
    pub async fn decay(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
        minutes: u32,
        activity: ActivityClass,
    ) -> Result<(), ManagerError> {
        let mut state = self.get_or_init(conn, entity_key).await?;
        let hours = minutes as f32 / 60.0;
        let multiplier = activity.decay_multiplier();

        for kind in NeedKind::ALL {
            state.adjust(kind, -(kind.decay_per_hour() * hours * multiplier));
            if state.level(kind) < CRAVING_THRESHOLD {
                let craving = state.cravings.get(&kind).copied().unwrap_or(0.0);
                state
                    .cravings
                    .insert(kind, (craving + CRAVING_PER_HOUR * hours).min(100.0));
            }
        }
        needs::upsert(conn, &self.session_id, entity_key, &state).await?;
        Ok(())
    }

    /// Entities with needs rows, for bulk decay.
    pub async fn tracked_entities(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<String>, ManagerError> {
        Ok(needs::list_entities(conn, &self.session_id).await?)
    }

    /// Mark needs as surfaced to the player this turn.
    pub async fn mark_communicated(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
        kinds: &[NeedKind],
        turn_number: u32,
    ) -> Result<(), ManagerError> {
        let mut state = self.get_or_init(conn, entity_key).await?;
        for kind in kinds {
            state.last_communicated.insert(*kind, turn_number);
        }
        needs::upsert(conn, &self.session_id, entity_key, &state).await?;
        Ok(())
    }
}
