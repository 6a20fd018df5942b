//! Combat manager: damage and healing.

use sqlx::SqliteConnection;

use crate::store::entities;

use super::ManagerError;

/// Outcome of a damage application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    pub hit_points: i32,
    pub died: bool,
}

pub struct CombatManager {
    session_id: String,
}

impl CombatManager {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    /// Apply damage; hit points floor at 0. Reaching 0 reports `died` so the
    /// caller can run the death manager.
    pub async fn damage(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
        amount: u32,
    ) -> Result<DamageResult, ManagerError> {
        let mut entity = entities::get(conn, &self.session_id, entity_key)
            .await?
            .ok_or_else(|| ManagerError::not_found("Entity", entity_key))?;
        if !entity.is_alive {
            return Err(ManagerError::invariant(format!(
                "entity '{}' is already dead",
                entity_key
            )));
        }
        entity.hit_points = (entity.hit_points - amount as i32).max(0);
        let died = entity.hit_points == 0;
        entities::update(conn, &self.session_id, &entity).await?;

        tracing::debug!(
            entity = entity_key,
            amount,
            remaining = entity.hit_points,
            died,
            "damage applied"
        );
        Ok(DamageResult {
            hit_points: entity.hit_points,
            died,
        })
    }

    /// Heal, clamped to max hit points. Healing the dead is rejected.
    pub async fn heal(
        &self,
        conn: &mut SqliteConnection,
        entity_key: &str,
        amount: u32,
    ) -> Result<i32, ManagerError> {
        let mut entity = entities::get(conn, &self.session_id, entity_key)
            .await?
            .ok_or_else(|| ManagerError::not_found("Entity", entity_key))?;
        if !entity.is_alive {
            return Err(ManagerError::invariant(format!(
                "cannot heal dead entity '{}'",
                entity_key
            )));
        }
        entity.hit_points = (entity.hit_points + amount as i32).min(entity.max_hit_points);
        entities::update(conn, &self.session_id, &entity).await?;
        Ok(entity.hit_points)
    }
}
