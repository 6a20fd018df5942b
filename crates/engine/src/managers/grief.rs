//! Grief manager.
//!
//! When an entity dies, everyone who knew them reacts: a grieving fact is
//! recorded and their comfort need takes a hit proportional to familiarity.

use sqlx::SqliteConnection;

use fateweaver_domain::{Fact, NeedKind, SubjectType};

use crate::store::{facts, needs, relationships};

use super::ManagerError;

/// Familiarity below which a death passes unremarked.
const GRIEF_FAMILIARITY_THRESHOLD: u8 = 30;

pub struct GriefManager {
    session_id: String,
}

impl GriefManager {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    /// Propagate a death to everyone related to the deceased. Returns the
    /// keys of grieving entities.
    pub async fn on_death(
        &self,
        conn: &mut SqliteConnection,
        deceased_key: &str,
        turn_number: u32,
    ) -> Result<Vec<String>, ManagerError> {
        // Mourners are those whose attitude toward the deceased carries
        // enough familiarity.
        let toward_deceased =
            relationships::list_toward(conn, &self.session_id, deceased_key).await?;

        let mut grieving = Vec::new();
        for relationship in toward_deceased {
            if relationship.attitude.familiarity < GRIEF_FAMILIARITY_THRESHOLD {
                continue;
            }
            let mourner = relationship.from_entity.as_str().to_string();

            let fact = Fact {
                subject_type: SubjectType::Entity,
                subject_key: mourner.clone(),
                predicate: "grieving".to_string(),
                value: deceased_key.to_string(),
                is_secret: false,
                certainty: 1.0,
                recorded_turn: turn_number,
            };
            facts::insert(conn, &self.session_id, &fact).await?;

            if let Some(mut state) = needs::get(conn, &self.session_id, &mourner).await? {
                let hit = f32::from(relationship.attitude.familiarity) / 2.0;
                state.adjust(NeedKind::Comfort, -hit);
                state.adjust(NeedKind::Purpose, -hit / 2.0);
                needs::upsert(conn, &self.session_id, &mourner, &state).await?;
            }
            grieving.push(mourner);
        }

        if !grieving.is_empty() {
            tracing::info!(
                deceased = deceased_key,
                mourners = grieving.len(),
                "grief propagated"
            );
        }
        Ok(grieving)
    }
}
