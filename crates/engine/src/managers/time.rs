//! Time manager.
//!
//! Advancing time is the heartbeat of the simulation: it moves the clock,
//! rolls weather on day boundaries, decays needs proportionally to elapsed
//! minutes and activity class, and reconciles NPC schedules.

use std::sync::Arc;

use sqlx::SqliteConnection;

use fateweaver_domain::{ActivityClass, GameClock, ScheduleEntry};

use crate::infrastructure::ports::RandomPort;
use crate::store::{entities, game_time, schedules};

use super::needs::NeedsManager;
use super::ManagerError;

/// Result of advancing the clock.
#[derive(Debug, Clone)]
pub struct TimeAdvance {
    pub clock: GameClock,
    pub days_crossed: u32,
    /// Entities moved by schedule reconciliation.
    pub npc_moves: Vec<(String, String)>,
}

pub struct TimeManager {
    session_id: String,
    random: Arc<dyn RandomPort>,
}

impl TimeManager {
    pub fn new(session_id: String, random: Arc<dyn RandomPort>) -> Self {
        Self { session_id, random }
    }

    pub async fn clock(&self, conn: &mut SqliteConnection) -> Result<GameClock, ManagerError> {
        Ok(game_time::get(conn, &self.session_id)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_clock(
        &self,
        conn: &mut SqliteConnection,
        clock: &GameClock,
    ) -> Result<(), ManagerError> {
        game_time::set(conn, &self.session_id, clock).await?;
        Ok(())
    }

    /// Advance game time by `minutes`.
    pub async fn advance(
        &self,
        conn: &mut SqliteConnection,
        minutes: u32,
        activity: ActivityClass,
        needs: &NeedsManager,
    ) -> Result<TimeAdvance, ManagerError> {
        let mut clock = self.clock(conn).await?;
        let days_crossed = clock.advance(minutes);

        for _ in 0..days_crossed {
            let roll = self.random.gen_range(0, 100) as u8;
            clock.weather = clock.weather.next(roll);
        }
        game_time::set(conn, &self.session_id, &clock).await?;

        if minutes > 0 {
            for entity_key in needs.tracked_entities(conn).await? {
                needs.decay(conn, &entity_key, minutes, activity).await?;
            }
        }

        let npc_moves = self.reconcile_schedules(conn, &clock).await?;

        tracing::debug!(
            minutes,
            day = clock.day,
            time = %clock.time_string(),
            weather = %clock.weather,
            moved = npc_moves.len(),
            "time advanced"
        );

        Ok(TimeAdvance {
            clock,
            days_crossed,
            npc_moves,
        })
    }

    /// Move NPCs to wherever their schedule says they should be now.
    ///
    /// For each scheduled entity, the entry in effect is the latest one at
    /// or before the current time on the current weekday.
    async fn reconcile_schedules(
        &self,
        conn: &mut SqliteConnection,
        clock: &GameClock,
    ) -> Result<Vec<(String, String)>, ManagerError> {
        let entries = schedules::list_for_day(conn, &self.session_id, clock.day_of_week()).await?;
        let mut moves = Vec::new();

        let mut current: Option<&ScheduleEntry> = None;
        let mut current_entity: Option<&str> = None;

        let flush =
            |slot: &mut Option<&ScheduleEntry>, moves: &mut Vec<(String, String)>| {
                if let Some(entry) = slot.take() {
                    moves.push((
                        entry.entity.as_str().to_string(),
                        entry.location.as_str().to_string(),
                    ));
                }
            };

        for entry in &entries {
            if Some(entry.entity.as_str()) != current_entity {
                flush(&mut current, &mut moves);
                current_entity = Some(entry.entity.as_str());
            }
            if entry.time_minutes <= clock.minutes_of_day {
                current = Some(entry);
            }
        }
        flush(&mut current, &mut moves);

        let mut applied = Vec::new();
        for (entity_key, location_key) in moves {
            let Some(entity) = entities::get(conn, &self.session_id, &entity_key).await? else {
                continue;
            };
            if !entity.is_alive || !entity.is_active {
                continue;
            }
            if entity.location.as_ref().map(|l| l.as_str()) == Some(location_key.as_str()) {
                continue;
            }
            entities::set_location(conn, &self.session_id, &entity_key, Some(&location_key))
                .await?;
            applied.push((entity_key, location_key));
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::test_support::seed_session;
    use fateweaver_domain::{DayOfWeek, EntityKey, LocationKey};

    #[tokio::test]
    async fn test_advance_is_exact() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let time = &ctx.managers.time;

        let before = time.clock(&mut conn).await.unwrap();
        let advance = time
            .advance(&mut conn, 95, ActivityClass::Idle, &ctx.managers.needs)
            .await
            .unwrap();
        assert_eq!(
            advance.clock.absolute_minutes(),
            before.absolute_minutes() + 95
        );
    }

    #[tokio::test]
    async fn test_advance_decays_needs() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        ctx.managers
            .needs
            .get_or_init(&mut conn, "player")
            .await
            .unwrap();
        ctx.managers
            .time
            .advance(&mut conn, 60, ActivityClass::Idle, &ctx.managers.needs)
            .await
            .unwrap();

        let state = ctx
            .managers
            .needs
            .get_or_init(&mut conn, "player")
            .await
            .unwrap();
        assert!(state.level(fateweaver_domain::NeedKind::Thirst) < 100.0);
    }

    #[tokio::test]
    async fn test_schedule_reconciliation_moves_npc() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let sid = ctx.session_id.to_string();

        // Seed clock starts day 1 (monday) 08:00. Bartender heads to the
        // cellar at 09:00 every monday.
        crate::store::schedules::insert(
            &mut conn,
            &sid,
            &ScheduleEntry {
                entity: EntityKey::new("bartender_001").unwrap(),
                day_of_week: DayOfWeek::Monday,
                time_minutes: 9 * 60,
                location: LocationKey::new("cellar").unwrap(),
                activity: "fetch stock".to_string(),
            },
        )
        .await
        .unwrap();

        let advance = ctx
            .managers
            .time
            .advance(&mut conn, 90, ActivityClass::Idle, &ctx.managers.needs)
            .await
            .unwrap();
        assert!(advance
            .npc_moves
            .iter()
            .any(|(entity, location)| entity == "bartender_001" && location == "cellar"));

        let bartender = ctx
            .managers
            .entities
            .get(&mut conn, "bartender_001")
            .await
            .unwrap();
        assert_eq!(
            bartender.location,
            Some(LocationKey::new("cellar").unwrap())
        );
    }
}
