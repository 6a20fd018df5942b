//! Entity manager.

use sqlx::SqliteConnection;

use fateweaver_domain::{Appearance, AttributeKind, Entity, EntityKind};

use crate::store::{entities, locations};

use super::ManagerError;

pub struct EntityManager {
    session_id: String,
}

impl EntityManager {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    /// Create an entity. Exactly one `player` kind may exist per session,
    /// and the entity's location (if set) must exist.
    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        entity: &Entity,
    ) -> Result<(), ManagerError> {
        if entity.kind == EntityKind::Player
            && entities::count_players(conn, &self.session_id).await? > 0
        {
            return Err(ManagerError::invariant(
                "session already has a player entity",
            ));
        }
        if let Some(location) = &entity.location {
            if !locations::exists(conn, &self.session_id, location.as_str()).await? {
                return Err(ManagerError::not_found("Location", location.as_str()));
            }
        }
        entities::insert(conn, &self.session_id, entity).await?;
        Ok(())
    }

    pub async fn get(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<Entity, ManagerError> {
        entities::get(conn, &self.session_id, key)
            .await?
            .ok_or_else(|| ManagerError::not_found("Entity", key))
    }

    pub async fn try_get(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<Option<Entity>, ManagerError> {
        Ok(entities::get(conn, &self.session_id, key).await?)
    }

    pub async fn list_active_at_location(
        &self,
        conn: &mut SqliteConnection,
        location_key: &str,
    ) -> Result<Vec<Entity>, ManagerError> {
        Ok(entities::list_active_at_location(conn, &self.session_id, location_key).await?)
    }

    /// Move an entity; the destination must exist.
    pub async fn move_to(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
        location_key: &str,
    ) -> Result<(), ManagerError> {
        if !locations::exists(conn, &self.session_id, location_key).await? {
            return Err(ManagerError::not_found("Location", location_key));
        }
        entities::set_location(conn, &self.session_id, key, Some(location_key)).await?;
        tracing::debug!(entity = key, location = location_key, "entity moved");
        Ok(())
    }

    /// The single appearance mutator; dedicated columns stay the source of
    /// truth, the JSON mirror rides along.
    pub async fn update_appearance(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
        appearance: Appearance,
    ) -> Result<(), ManagerError> {
        let mut entity = self.get(conn, key).await?;
        entity.appearance = appearance;
        entities::update(conn, &self.session_id, &entity).await?;
        Ok(())
    }

    /// Adjust one attribute by a signed delta, clamped to 0-100.
    pub async fn adjust_attribute(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
        kind: AttributeKind,
        delta: i32,
    ) -> Result<u8, ManagerError> {
        let mut entity = self.get(conn, key).await?;
        let new = (i32::from(entity.attributes.get(kind)) + delta).clamp(0, 100) as u8;
        entity.attributes.set(kind, new);
        entities::update(conn, &self.session_id, &entity).await?;
        Ok(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::test_support::seed_session;
    use fateweaver_domain::{EntityKey, LocationKey};

    #[tokio::test]
    async fn test_single_player_invariant() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let second_player = Entity::player(
            EntityKey::new("impostor").unwrap(),
            "Impostor",
            LocationKey::new("tavern").unwrap(),
        );
        let result = ctx.managers.entities.create(&mut conn, &second_player).await;
        assert!(matches!(result, Err(ManagerError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_move_to_unknown_location_fails() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let result = ctx
            .managers
            .entities
            .move_to(&mut conn, "bartender_001", "nowhere")
            .await;
        assert!(matches!(result, Err(ManagerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_session_scoping() {
        let store = Store::in_memory().await.unwrap();
        let ctx_a = seed_session(&store).await;
        let ctx_b = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        // Session B's manager must not see session A's entities beyond the
        // shared seed names scoped to its own session.
        let a_list = crate::store::entities::list(&mut conn, &ctx_a.session_id.to_string())
            .await
            .unwrap();
        let b_list = crate::store::entities::list(&mut conn, &ctx_b.session_id.to_string())
            .await
            .unwrap();
        assert_eq!(a_list.len(), b_list.len());

        // Mutating through A's manager leaves B untouched.
        ctx_a
            .managers
            .entities
            .adjust_attribute(&mut conn, "player", AttributeKind::Might, 10)
            .await
            .unwrap();
        let b_player = ctx_b.managers.entities.get(&mut conn, "player").await.unwrap();
        assert_eq!(b_player.attributes.might, 50);
    }
}
