//! Death manager.

use sqlx::SqliteConnection;

use fateweaver_domain::ItemPlacement;

use crate::store::{entities, items, schedules};

use super::ManagerError;

pub struct DeathManager {
    session_id: String,
}

impl DeathManager {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    /// Mark an entity dead: flips `is_alive`, drops carried items at its
    /// location, and cancels its schedule.
    pub async fn kill(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
    ) -> Result<(), ManagerError> {
        let mut entity = entities::get(conn, &self.session_id, entity_key)
            .await?
            .ok_or_else(|| ManagerError::not_found("Entity", entity_key))?;
        if !entity.is_alive {
            return Ok(());
        }
        entity.is_alive = false;
        entity.hit_points = 0;
        entities::update(conn, &self.session_id, &entity).await?;

        if let Some(location) = &entity.location {
            let held = items::list_held_by(conn, &self.session_id, entity_key).await?;
            for item in held {
                items::set_placement(
                    conn,
                    &self.session_id,
                    item.key.as_str(),
                    &ItemPlacement::AtLocation(location.clone()),
                )
                .await?;
            }
        }

        schedules::delete_for_entity(conn, &self.session_id, entity_key).await?;
        tracing::info!(entity = entity_key, "entity died");
        Ok(())
    }
}
