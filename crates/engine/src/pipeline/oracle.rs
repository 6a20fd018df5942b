//! GM decision oracle.
//!
//! Every action always gets `no_twist`. Twists are proposed only when a
//! supporting fact exists, and each carries the predicates that justify it.

use sqlx::SqliteConnection;

use fateweaver_domain::{ActionPrediction, ActionType, GmDecision, SubjectType};

use crate::managers::{ManagerError, Managers};

pub struct GmDecisionOracle {
    max_decisions: usize,
}

impl GmDecisionOracle {
    pub fn new(max_decisions: usize) -> Self {
        Self { max_decisions }
    }

    /// Decisions for one candidate action, best-weighted first.
    pub async fn decisions(
        &self,
        conn: &mut SqliteConnection,
        managers: &Managers,
        location_key: &str,
        action: &ActionPrediction,
    ) -> Result<Vec<GmDecision>, ManagerError> {
        let mut decisions = vec![GmDecision::no_twist()];

        match action.action_type {
            ActionType::InteractNpc => {
                if managers
                    .facts
                    .find(conn, SubjectType::Location, location_key, "recent_theft")
                    .await?
                    .is_some()
                {
                    decisions.push(GmDecision {
                        key: "theft_accusation".to_string(),
                        weight: 0.2,
                        grounding_facts: vec!["recent_theft".to_string()],
                        description: "The NPC suspects the player of the recent theft"
                            .to_string(),
                    });
                }
                if let Some(target) = &action.target_key {
                    if managers
                        .facts
                        .find(conn, SubjectType::Entity, target, "npc_has_secret")
                        .await?
                        .is_some()
                    {
                        decisions.push(GmDecision {
                            key: "secret_reveal".to_string(),
                            weight: 0.15,
                            grounding_facts: vec!["npc_has_secret".to_string()],
                            description: "The NPC lets a hint of their secret slip".to_string(),
                        });
                    }
                }
            }
            ActionType::Observe => {
                if managers
                    .facts
                    .find(conn, SubjectType::Location, location_key, "hidden_detail")
                    .await?
                    .is_some()
                {
                    decisions.push(GmDecision {
                        key: "hidden_detail_noticed".to_string(),
                        weight: 0.2,
                        grounding_facts: vec!["hidden_detail".to_string()],
                        description: "Observation surfaces the hidden detail".to_string(),
                    });
                }
            }
            ActionType::TakeItem | ActionType::UseItem => {
                if let Some(target) = &action.target_key {
                    if managers
                        .facts
                        .find(conn, SubjectType::Item, target, "watched")
                        .await?
                        .is_some()
                    {
                        decisions.push(GmDecision {
                            key: "caught_in_the_act".to_string(),
                            weight: 0.2,
                            grounding_facts: vec!["watched".to_string()],
                            description: "Someone is watching the item".to_string(),
                        });
                    }
                }
            }
            _ => {}
        }

        decisions.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        decisions.truncate(self.max_decisions);
        Ok(decisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::test_support::seed_session;
    use fateweaver_domain::{DeltaOperation, Fact};

    fn interact(target: &str) -> ActionPrediction {
        ActionPrediction::new(ActionType::InteractNpc, 0.5).with_target(target, "Marcus")
    }

    #[tokio::test]
    async fn test_no_twist_always_present() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let decisions = GmDecisionOracle::new(2)
            .decisions(&mut conn, &ctx.managers, "tavern", &interact("bartender_001"))
            .await
            .unwrap();
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].is_no_twist());
    }

    #[tokio::test]
    async fn test_twist_requires_grounding_fact() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let fact = Fact::new(SubjectType::Location, "tavern", "recent_theft", "silverware");
        ctx.managers
            .facts
            .apply(&mut conn, &fact, DeltaOperation::Add)
            .await
            .unwrap();

        let decisions = GmDecisionOracle::new(3)
            .decisions(&mut conn, &ctx.managers, "tavern", &interact("bartender_001"))
            .await
            .unwrap();
        let twist = decisions
            .iter()
            .find(|d| d.key == "theft_accusation")
            .expect("theft twist proposed");
        assert_eq!(twist.grounding_facts, vec!["recent_theft".to_string()]);
        // no_twist still outweighs the twist.
        assert!(decisions[0].is_no_twist());
    }

    #[tokio::test]
    async fn test_max_decisions_cap() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        for (subject_type, subject, predicate) in [
            (SubjectType::Location, "tavern", "recent_theft"),
            (SubjectType::Entity, "bartender_001", "npc_has_secret"),
        ] {
            let fact = Fact::new(subject_type, subject, predicate, "true");
            ctx.managers
                .facts
                .apply(&mut conn, &fact, DeltaOperation::Add)
                .await
                .unwrap();
        }

        let decisions = GmDecisionOracle::new(2)
            .decisions(&mut conn, &ctx.managers, "tavern", &interact("bartender_001"))
            .await
            .unwrap();
        assert_eq!(decisions.len(), 2);
    }
}
