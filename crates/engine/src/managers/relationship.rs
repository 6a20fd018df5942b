//! Relationship manager.
//!
//! Attitudes clamp to 0-100 and every change appends a history row. First
//! meetings force a familiarity bump on both directions.

use std::sync::Arc;

use sqlx::SqliteConnection;

use fateweaver_domain::{
    Attitude, AttitudeDimension, EntityKey, Relationship, RelationshipChange,
};

use crate::infrastructure::ports::RandomPort;
use crate::store::{entities, relationships};

use super::ManagerError;

/// Familiarity gained when two entities first meet: 10-20, rolled per
/// direction.
const FIRST_MEETING_FAMILIARITY_MIN: i32 = 10;
const FIRST_MEETING_FAMILIARITY_MAX: i32 = 20;

pub struct RelationshipManager {
    session_id: String,
    random: Arc<dyn RandomPort>,
}

impl RelationshipManager {
    pub fn new(session_id: String, random: Arc<dyn RandomPort>) -> Self {
        Self { session_id, random }
    }

    async fn ensure_entities(
        &self,
        conn: &mut SqliteConnection,
        from: &str,
        to: &str,
    ) -> Result<(EntityKey, EntityKey), ManagerError> {
        if from == to {
            return Err(ManagerError::invariant(
                "relationship endpoints must be distinct",
            ));
        }
        let from_entity = entities::get(conn, &self.session_id, from)
            .await?
            .ok_or_else(|| ManagerError::not_found("Entity", from))?;
        let to_entity = entities::get(conn, &self.session_id, to)
            .await?
            .ok_or_else(|| ManagerError::not_found("Entity", to))?;
        Ok((from_entity.key, to_entity.key))
    }

    async fn get_or_default(
        &self,
        conn: &mut SqliteConnection,
        from: &EntityKey,
        to: &EntityKey,
    ) -> Result<Relationship, ManagerError> {
        match relationships::get(conn, &self.session_id, from.as_str(), to.as_str()).await? {
            Some(relationship) => Ok(relationship),
            None => Ok(Relationship {
                from_entity: from.clone(),
                to_entity: to.clone(),
                attitude: Attitude::stranger(),
                has_met: false,
            }),
        }
    }

    /// `from`'s attitude toward `to`, stranger defaults if never recorded.
    pub async fn attitude(
        &self,
        conn: &mut SqliteConnection,
        from: &str,
        to: &str,
    ) -> Result<Attitude, ManagerError> {
        let (from_key, to_key) = self.ensure_entities(conn, from, to).await?;
        Ok(self.get_or_default(conn, &from_key, &to_key).await?.attitude)
    }

    /// Apply a signed delta to one dimension. Clamps, persists, and appends
    /// a history row recording the delta actually applied.
    pub async fn update_attitude(
        &self,
        conn: &mut SqliteConnection,
        from: &str,
        to: &str,
        dimension: AttitudeDimension,
        delta: i32,
        reason: &str,
        turn_number: u32,
    ) -> Result<i32, ManagerError> {
        let (from_key, to_key) = self.ensure_entities(conn, from, to).await?;
        let mut relationship = self.get_or_default(conn, &from_key, &to_key).await?;
        let applied = relationship.attitude.apply(dimension, delta);
        relationships::upsert(conn, &self.session_id, &relationship).await?;
        relationships::append_change(
            conn,
            &self.session_id,
            &RelationshipChange {
                from_entity: from_key,
                to_entity: to_key,
                dimension,
                delta: applied,
                reason: reason.to_string(),
                turn_number,
            },
        )
        .await?;
        Ok(applied)
    }

    /// Record a first meeting: marks both directions met and forces the
    /// familiarity bump. Subsequent calls are no-ops.
    pub async fn record_meeting(
        &self,
        conn: &mut SqliteConnection,
        a: &str,
        b: &str,
        turn_number: u32,
    ) -> Result<bool, ManagerError> {
        let (a_key, b_key) = self.ensure_entities(conn, a, b).await?;

        let mut first_meeting = false;
        for (from, to) in [(&a_key, &b_key), (&b_key, &a_key)] {
            let mut relationship = self.get_or_default(conn, from, to).await?;
            if relationship.has_met {
                continue;
            }
            first_meeting = true;
            relationship.has_met = true;
            let bump = self.random.gen_range(
                FIRST_MEETING_FAMILIARITY_MIN,
                FIRST_MEETING_FAMILIARITY_MAX,
            );
            let applied = relationship
                .attitude
                .apply(AttitudeDimension::Familiarity, bump);
            relationships::upsert(conn, &self.session_id, &relationship).await?;
            relationships::append_change(
                conn,
                &self.session_id,
                &RelationshipChange {
                    from_entity: from.clone(),
                    to_entity: to.clone(),
                    dimension: AttitudeDimension::Familiarity,
                    delta: applied,
                    reason: "first meeting".to_string(),
                    turn_number,
                },
            )
            .await?;
        }
        if first_meeting {
            tracing::debug!(a, b, "first meeting recorded");
        }
        Ok(first_meeting)
    }

    pub async fn history(
        &self,
        conn: &mut SqliteConnection,
        from: &str,
        to: &str,
    ) -> Result<Vec<RelationshipChange>, ManagerError> {
        Ok(relationships::list_changes(conn, &self.session_id, from, to).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::test_support::seed_session;

    #[tokio::test]
    async fn test_update_clamps_and_records_history() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let rels = &ctx.managers.relationships;

        let applied = rels
            .update_attitude(
                &mut conn,
                "bartender_001",
                "player",
                AttitudeDimension::Liking,
                200,
                "heroics",
                1,
            )
            .await
            .unwrap();
        // Stranger liking starts at 50; clamped to 100.
        assert_eq!(applied, 50);

        let attitude = rels.attitude(&mut conn, "bartender_001", "player").await.unwrap();
        assert_eq!(attitude.liking, 100);

        let history = rels
            .history(&mut conn, "bartender_001", "player")
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].delta, 50);
        assert_eq!(history[0].reason, "heroics");
    }

    #[tokio::test]
    async fn test_first_meeting_bumps_familiarity_both_ways() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let rels = &ctx.managers.relationships;

        let first = rels
            .record_meeting(&mut conn, "player", "bartender_001", 1)
            .await
            .unwrap();
        assert!(first);

        for (from, to) in [("player", "bartender_001"), ("bartender_001", "player")] {
            let attitude = rels.attitude(&mut conn, from, to).await.unwrap();
            assert!(
                (10..=20).contains(&attitude.familiarity),
                "familiarity was {}",
                attitude.familiarity
            );
        }

        // Meeting again changes nothing.
        let again = rels
            .record_meeting(&mut conn, "player", "bartender_001", 2)
            .await
            .unwrap();
        assert!(!again);
    }

    #[tokio::test]
    async fn test_self_relationship_rejected() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let result = ctx
            .managers
            .relationships
            .update_attitude(
                &mut conn,
                "player",
                "player",
                AttitudeDimension::Trust,
                5,
                "",
                1,
            )
            .await;
        assert!(matches!(result, Err(ManagerError::InvariantViolation(_))));
    }
}
