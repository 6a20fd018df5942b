//! Action predictor: enumerates probable next actions from the scene.
//!
//! Scoring is additive per the tuning table below, clamped to 0.95. Each
//! prediction carries regex input patterns derived from display names and
//! verb families, consumed later by the action matcher.

use sqlx::SqliteConnection;

use fateweaver_domain::{ActionPrediction, ActionType, SubjectType, TurnRecord};

use crate::managers::{ManagerError, Managers};
use crate::scene::NarratorManifest;

// Scoring table.
const NPC_BASE: f32 = 0.15;
const NPC_SCENE_FOCUS: f32 = 0.20;
const NPC_RECENT_CONVERSATION: f32 = 0.10;
const NPC_QUEST: f32 = 0.15;
const ITEM_BASE: f32 = 0.20;
const ITEM_MUNDANE_FACTOR: f32 = 0.5;
const ITEM_QUEST: f32 = 0.25;
const EXIT_BASE: f32 = 0.15;
const EXIT_QUEST_DESTINATION: f32 = 0.15;
const EXPLORATION_BONUS: f32 = 0.10;
const OBSERVE_BASE: f32 = 0.15;
const MAX_PROBABILITY: f32 = 0.95;

/// Fact predicate recording the turn the player arrived at a location.
pub const ARRIVED_TURN_PREDICATE: &str = "player_arrived_turn";

pub struct ActionPredictor {
    max_actions: usize,
}

impl ActionPredictor {
    pub fn new(max_actions: usize) -> Self {
        Self { max_actions }
    }

    /// Predict the most probable next actions, sorted by probability and
    /// truncated to `max_actions`.
    pub async fn predict(
        &self,
        conn: &mut SqliteConnection,
        managers: &Managers,
        manifest: &NarratorManifest,
        recent_turns: &[TurnRecord],
    ) -> Result<Vec<ActionPrediction>, ManagerError> {
        let quests = managers.quests.active(conn).await?;
        let quest_npcs: Vec<&str> = quests
            .iter()
            .filter_map(|q| q.target_entity.as_ref().map(|e| e.as_str()))
            .collect();
        let quest_items: Vec<&str> = quests
            .iter()
            .filter_map(|q| q.quest_item.as_ref().map(|i| i.as_str()))
            .collect();
        let quest_destinations: Vec<&str> = quests
            .iter()
            .filter_map(|q| q.destination.as_ref().map(|l| l.as_str()))
            .collect();

        let turns_at_location = self
            .turns_at_location(conn, managers, &manifest.location.key)
            .await?;
        let exploring = turns_at_location < 2;

        let last_response = recent_turns.last().map(|t| t.gm_response.as_str());

        let mut predictions = Vec::new();

        for npc in &manifest.npcs {
            let mut probability = NPC_BASE;
            let mut reasons = vec!["npc present"];

            if last_response.is_some_and(|response| response.contains(npc.key.as_str())) {
                probability += NPC_SCENE_FOCUS;
                reasons.push("scene focus");
            }
            if recent_turns
                .iter()
                .any(|turn| turn.player_input.to_lowercase().contains(&npc.display.to_lowercase()))
            {
                probability += NPC_RECENT_CONVERSATION;
                reasons.push("recent conversation");
            }
            if quest_npcs.contains(&npc.key.as_str()) {
                probability += NPC_QUEST;
                reasons.push("quest npc");
            }

            predictions.push(
                ActionPrediction {
                    action_type: ActionType::InteractNpc,
                    target_key: Some(npc.key.clone()),
                    target_display: Some(npc.display.clone()),
                    input_patterns: npc_patterns(&npc.display, &npc.key),
                    probability: probability.min(MAX_PROBABILITY),
                    reason: reasons.join(", "),
                },
            );
        }

        for item in &manifest.items_at_location {
            let mundane = item.summary.starts_with("mundane");
            let mut probability = ITEM_BASE;
            if mundane {
                probability *= ITEM_MUNDANE_FACTOR;
            }
            let mut reasons = vec!["item visible"];
            if quest_items.contains(&item.key.as_str()) {
                probability += ITEM_QUEST;
                reasons.push("quest item");
            }

            predictions.push(ActionPrediction {
                action_type: ActionType::TakeItem,
                target_key: Some(item.key.clone()),
                target_display: Some(item.display.clone()),
                input_patterns: item_patterns(&item.display, &item.key),
                probability: probability.min(MAX_PROBABILITY),
                reason: reasons.join(", "),
            });
        }

        for exit in &manifest.exits {
            let mut probability = EXIT_BASE;
            let mut reasons = vec!["exit present"];
            if quest_destinations.contains(&exit.key.as_str()) {
                probability += EXIT_QUEST_DESTINATION;
                reasons.push("quest destination");
            }
            if exploring {
                probability += EXPLORATION_BONUS;
                reasons.push("exploring");
            }

            predictions.push(ActionPrediction {
                action_type: ActionType::Move,
                target_key: Some(exit.key.clone()),
                target_display: Some(exit.display.clone()),
                input_patterns: exit_patterns(&exit.display, exit.direction.as_str()),
                probability: probability.min(MAX_PROBABILITY),
                reason: reasons.join(", "),
            });
        }

        let mut observe_probability = OBSERVE_BASE;
        let mut observe_reasons = vec!["always available"];
        if exploring {
            observe_probability += EXPLORATION_BONUS;
            observe_reasons.push("exploring");
        }
        predictions.push(ActionPrediction {
            action_type: ActionType::Observe,
            target_key: None,
            target_display: None,
            input_patterns: observe_patterns(),
            probability: observe_probability.min(MAX_PROBABILITY),
            reason: observe_reasons.join(", "),
        });

        predictions.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        predictions.truncate(self.max_actions);
        Ok(predictions)
    }

    /// Turns spent at the current location, from the arrival-turn fact.
    async fn turns_at_location(
        &self,
        conn: &mut SqliteConnection,
        managers: &Managers,
        location_key: &str,
    ) -> Result<u32, ManagerError> {
        let arrived = managers
            .facts
            .find(conn, SubjectType::Location, location_key, ARRIVED_TURN_PREDICATE)
            .await?
            .and_then(|fact| fact.value.parse::<u32>().ok());
        match arrived {
            Some(arrived_turn) => Ok(crate::store::turns::count_since_turn(
                conn,
                managers.items.session_id(),
                arrived_turn,
            )
            .await?),
            None => Ok(0),
        }
    }
}

/// Escape regex metacharacters in a display name.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Aliases for a key: its non-numeric segments ("bartender_001" ->
/// "bartender"), so role words match as well as proper names.
fn key_aliases(key: &str) -> Vec<String> {
    key.split('_')
        .filter(|segment| !segment.is_empty() && !segment.chars().all(|c| c.is_ascii_digit()))
        .map(|segment| segment.to_string())
        .collect()
}

fn npc_patterns(display: &str, key: &str) -> Vec<String> {
    let mut names = vec![escape(&display.to_lowercase())];
    names.extend(key_aliases(key));
    let alternatives = names.join("|");
    vec![
        format!(r"(?i)\b(talk|speak|ask|greet|chat|say)\b.*({})", alternatives),
        format!(r"(?i)\bapproach\b.*({})", alternatives),
    ]
}

fn item_patterns(display: &str, key: &str) -> Vec<String> {
    let mut names = vec![escape(&display.to_lowercase())];
    names.extend(key_aliases(key));
    let alternatives = names.join("|");
    vec![
        format!(r"(?i)\b(take|grab|pick|get|lift)\b.*({})", alternatives),
        format!(r"(?i)\b(examine|inspect|look at)\b.*({})", alternatives),
    ]
}

fn exit_patterns(display: &str, direction: &str) -> Vec<String> {
    let name = escape(&display.to_lowercase());
    vec![
        format!(r"(?i)\b(go|walk|head|enter|leave)\b.*{}", name),
        format!(r"(?i)\b(go|walk|head)\b.*\b{}\b", direction),
    ]
}

/// Observe patterns stay generic and anchored: a specific unlisted target
/// ("examine the rune") must fall through to the sync path.
fn observe_patterns() -> Vec<String> {
    vec![
        r"(?i)^\s*(look|look around|observe|survey|glance around)\s*$".to_string(),
        r"(?i)^\s*(look|glance)\s+(around|about)\b.*$".to_string(),
        r"(?i)^\s*take in (the )?(room|scene|surroundings)\s*$".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ManifestBuilder;
    use crate::store::Store;
    use crate::test_support::seed_session;
    use fateweaver_domain::{LocationKey, Quest, QuestKey, QuestStatus};

    async fn predictions_for(
        store: &Store,
        ctx: &crate::test_support::TestContext,
        recent: &[TurnRecord],
    ) -> Vec<ActionPrediction> {
        let mut conn = store.pool().acquire().await.unwrap();
        let manifest = ManifestBuilder::build(&mut conn, &ctx.managers, "tavern", "player")
            .await
            .unwrap();
        ActionPredictor::new(5)
            .predict(&mut conn, &ctx.managers, &manifest, recent)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_predictions_cover_scene() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let predictions = predictions_for(&store, &ctx, &[]).await;

        assert!(predictions
            .iter()
            .any(|p| p.action_type == ActionType::InteractNpc
                && p.target_key.as_deref() == Some("bartender_001")));
        assert!(predictions
            .iter()
            .any(|p| p.action_type == ActionType::Observe));
        // Sorted descending.
        for window in predictions.windows(2) {
            assert!(window[0].probability >= window[1].probability);
        }
    }

    #[tokio::test]
    async fn test_quest_destination_boost() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        {
            let mut conn = store.pool().acquire().await.unwrap();
            ctx.managers
                .quests
                .add(
                    &mut conn,
                    &Quest {
                        key: QuestKey::new("cellar_delivery").unwrap(),
                        name: "Cellar delivery".to_string(),
                        description: String::new(),
                        status: QuestStatus::Active,
                        target_entity: None,
                        destination: Some(LocationKey::new("cellar").unwrap()),
                        quest_item: None,
                    },
                )
                .await
                .unwrap();
        }

        let predictions = predictions_for(&store, &ctx, &[]).await;
        let cellar = predictions
            .iter()
            .find(|p| p.action_type == ActionType::Move && p.target_key.as_deref() == Some("cellar"))
            .expect("cellar move prediction");
        let street = predictions
            .iter()
            .find(|p| p.action_type == ActionType::Move && p.target_key.as_deref() == Some("street"))
            .expect("street move prediction");
        assert!(cellar.probability > street.probability);
    }

    #[tokio::test]
    async fn test_probability_clamped() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let predictions = predictions_for(&store, &ctx, &[]).await;
        assert!(predictions.iter().all(|p| p.probability <= 0.95));
    }
}
