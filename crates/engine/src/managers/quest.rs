//! Quest and appointment manager.

use sqlx::SqliteConnection;

use fateweaver_domain::{Appointment, GameClock, Quest, QuestStatus};

use crate::store::{entities, items, locations, quests};

use super::ManagerError;

pub struct QuestManager {
    session_id: String,
}

impl QuestManager {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    /// Add a quest; referenced entities, items, and locations must exist.
    pub async fn add(
        &self,
        conn: &mut SqliteConnection,
        quest: &Quest,
    ) -> Result<(), ManagerError> {
        if let Some(target) = &quest.target_entity {
            if entities::get(conn, &self.session_id, target.as_str())
                .await?
                .is_none()
            {
                return Err(ManagerError::not_found("Entity", target.as_str()));
            }
        }
        if let Some(destination) = &quest.destination {
            if !locations::exists(conn, &self.session_id, destination.as_str()).await? {
                return Err(ManagerError::not_found("Location", destination.as_str()));
            }
        }
        if let Some(item) = &quest.quest_item {
            if items::get(conn, &self.session_id, item.as_str())
                .await?
                .is_none()
            {
                return Err(ManagerError::not_found("Item", item.as_str()));
            }
        }
        quests::insert(conn, &self.session_id, quest).await?;
        Ok(())
    }

    pub async fn active(&self, conn: &mut SqliteConnection) -> Result<Vec<Quest>, ManagerError> {
        Ok(quests::list_active(conn, &self.session_id).await?)
    }

    pub async fn complete(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<(), ManagerError> {
        quests::set_status(conn, &self.session_id, key, QuestStatus::Completed).await?;
        tracing::info!(quest = key, "quest completed");
        Ok(())
    }

    pub async fn fail(&self, conn: &mut SqliteConnection, key: &str) -> Result<(), ManagerError> {
        quests::set_status(conn, &self.session_id, key, QuestStatus::Failed).await?;
        Ok(())
    }

    pub async fn add_appointment(
        &self,
        conn: &mut SqliteConnection,
        appointment: &Appointment,
    ) -> Result<(), ManagerError> {
        if entities::get(conn, &self.session_id, appointment.entity.as_str())
            .await?
            .is_none()
        {
            return Err(ManagerError::not_found(
                "Entity",
                appointment.entity.as_str(),
            ));
        }
        if !locations::exists(conn, &self.session_id, appointment.location.as_str()).await? {
            return Err(ManagerError::not_found(
                "Location",
                appointment.location.as_str(),
            ));
        }
        quests::insert_appointment(conn, &self.session_id, appointment).await?;
        Ok(())
    }

    /// Appointments for an entity within the next `window_minutes` of game
    /// time; surfaced in the player summary.
    pub async fn upcoming(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
        clock: &GameClock,
        window_minutes: u32,
    ) -> Result<Vec<Appointment>, ManagerError> {
        Ok(quests::upcoming_appointments(
            conn,
            &self.session_id,
            entity_key,
            clock.day,
            clock.minutes_of_day,
            window_minutes,
        )
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::test_support::seed_session;
    use fateweaver_domain::{EntityKey, LocationKey, QuestKey};

    #[tokio::test]
    async fn test_quest_validates_references() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let quest = Quest {
            key: QuestKey::new("find_ghost").unwrap(),
            name: "Find the ghost".to_string(),
            description: String::new(),
            status: QuestStatus::Active,
            target_entity: Some(EntityKey::new("ghost_404").unwrap()),
            destination: None,
            quest_item: None,
        };
        let result = ctx.managers.quests.add(&mut conn, &quest).await;
        assert!(matches!(result, Err(ManagerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_upcoming_appointments_window() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        // Clock starts day 1 08:00. One appointment at 09:00, one tomorrow.
        for (day, minutes) in [(1u32, 9 * 60u32), (2, 9 * 60)] {
            ctx.managers
                .quests
                .add_appointment(
                    &mut conn,
                    &Appointment {
                        entity: EntityKey::new("player").unwrap(),
                        day,
                        time_minutes: minutes,
                        location: LocationKey::new("tavern").unwrap(),
                        description: "meet marcus".to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let clock = ctx.managers.time.clock(&mut conn).await.unwrap();
        let upcoming = ctx
            .managers
            .quests
            .upcoming(&mut conn, "player", &clock, 120)
            .await
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].day, 1);
    }
}
