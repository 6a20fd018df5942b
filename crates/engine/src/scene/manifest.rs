//! Grounding manifest: everything an LLM may reference in a scene.
//!
//! Built fresh per scene from live store records, read during generation
//! and validation, then discarded. Never persisted. The manifest is the
//! sole source of truth for entity references in generated prose.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use fateweaver_domain::Direction;

use crate::managers::{ManagerError, Managers};

/// One referenceable thing: canonical key plus display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub key: String,
    pub display: String,
    #[serde(default)]
    pub summary: String,
}

/// An exit from the scene's location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitEntry {
    pub direction: Direction,
    pub key: String,
    pub display: String,
}

/// Player block: what the narrator knows about the player at a glance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub key: String,
    pub display: String,
    pub visible_equipment: Vec<String>,
    pub condition: String,
    /// Needs below the alert threshold, worst first, as "need (level)".
    pub needs_alerts: Vec<String>,
    /// Imminent appointments as display strings.
    pub appointments: Vec<String>,
}

/// The full grounding manifest for one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarratorManifest {
    pub location: ManifestEntry,
    pub npcs: Vec<ManifestEntry>,
    pub items_at_location: Vec<ManifestEntry>,
    pub inventory: Vec<ManifestEntry>,
    pub storages: Vec<ManifestEntry>,
    pub exits: Vec<ExitEntry>,
    pub player: PlayerSummary,
}

impl NarratorManifest {
    /// Every key an LLM may legally reference in this scene.
    pub fn all_keys(&self) -> HashSet<&str> {
        let mut keys = HashSet::new();
        keys.insert(self.location.key.as_str());
        keys.insert(self.player.key.as_str());
        for entry in self
            .npcs
            .iter()
            .chain(&self.items_at_location)
            .chain(&self.inventory)
            .chain(&self.storages)
        {
            keys.insert(entry.key.as_str());
        }
        for exit in &self.exits {
            keys.insert(exit.key.as_str());
        }
        keys
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.all_keys().contains(key)
    }

    /// (key, display) pairs for unkeyed-mention scanning.
    pub fn display_names(&self) -> Vec<(&str, &str)> {
        let mut names: Vec<(&str, &str)> = Vec::new();
        names.push((self.player.key.as_str(), self.player.display.as_str()));
        for entry in self
            .npcs
            .iter()
            .chain(&self.items_at_location)
            .chain(&self.inventory)
            .chain(&self.storages)
        {
            names.push((entry.key.as_str(), entry.display.as_str()));
        }
        names
    }

    /// Render the manifest as a prompt block.
    pub fn prompt_block(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "LOCATION: [{}:{}] - {}\n",
            self.location.key, self.location.display, self.location.summary
        ));
        let section = |out: &mut String, title: &str, entries: &[ManifestEntry]| {
            if entries.is_empty() {
                return;
            }
            out.push_str(title);
            out.push('\n');
            for entry in entries {
                if entry.summary.is_empty() {
                    out.push_str(&format!("- [{}:{}]\n", entry.key, entry.display));
                } else {
                    out.push_str(&format!(
                        "- [{}:{}] - {}\n",
                        entry.key, entry.display, entry.summary
                    ));
                }
            }
        };
        section(&mut out, "NPCS PRESENT:", &self.npcs);
        section(&mut out, "ITEMS HERE:", &self.items_at_location);
        section(&mut out, "PLAYER INVENTORY:", &self.inventory);
        section(&mut out, "STORAGE:", &self.storages);
        if !self.exits.is_empty() {
            out.push_str("EXITS:\n");
            for exit in &self.exits {
                out.push_str(&format!(
                    "- {}: [{}:{}]\n",
                    exit.direction, exit.key, exit.display
                ));
            }
        }
        out.push_str(&format!(
            "PLAYER: [{}:{}] - condition {}, wearing {}\n",
            self.player.key,
            self.player.display,
            self.player.condition,
            if self.player.visible_equipment.is_empty() {
                "nothing notable".to_string()
            } else {
                self.player.visible_equipment.join(", ")
            }
        ));
        if !self.player.needs_alerts.is_empty() {
            out.push_str(&format!(
                "PLAYER NEEDS: {}\n",
                self.player.needs_alerts.join(", ")
            ));
        }
        if !self.player.appointments.is_empty() {
            out.push_str(&format!(
                "UPCOMING: {}\n",
                self.player.appointments.join("; ")
            ));
        }
        out
    }
}

/// Needs below this level surface as alerts in the player summary.
const NEEDS_ALERT_THRESHOLD: f32 = 35.0;

/// Appointments within this many game minutes surface in the summary.
const APPOINTMENT_WINDOW_MINUTES: u32 = 240;

/// Compiles manifests from live store state.
pub struct ManifestBuilder;

impl ManifestBuilder {
    /// Build the manifest for the player's current scene.
    pub async fn build(
        conn: &mut SqliteConnection,
        managers: &Managers,
        location_key: &str,
        player_key: &str,
    ) -> Result<NarratorManifest, ManagerError> {
        let location = managers.locations.get(conn, location_key).await?;
        let player = managers.entities.get(conn, player_key).await?;

        let npcs = managers
            .entities
            .list_active_at_location(conn, location_key)
            .await?
            .into_iter()
            .filter(|npc| npc.is_alive)
            .map(|npc| {
                let mut summary = npc.personality.clone();
                if summary.is_empty() {
                    summary = npc.background.clone();
                }
                ManifestEntry {
                    key: npc.key.as_str().to_string(),
                    display: npc.display_name,
                    summary,
                }
            })
            .collect();

        let items_at_location = crate::store::items::list_at_location(
            conn,
            managers.items.session_id(),
            location_key,
        )
        .await
        .map_err(ManagerError::from)?
        .into_iter()
        .map(|item| ManifestEntry {
            key: item.key.as_str().to_string(),
            display: item.display_name,
            summary: format!("{}, {}", item.kind.as_str(), item.condition.as_str()),
        })
        .collect();

        let inventory = managers
            .items
            .inventory(conn, player_key)
            .await?
            .into_iter()
            .map(|item| ManifestEntry {
                key: item.key.as_str().to_string(),
                display: item.display_name,
                summary: String::new(),
            })
            .collect();

        let storages = crate::store::storages::list_at_location(
            conn,
            managers.items.session_id(),
            location_key,
        )
        .await
        .map_err(ManagerError::from)?
        .into_iter()
        .map(|storage| ManifestEntry {
            key: storage.key.as_str().to_string(),
            display: storage.display_name,
            summary: storage.kind.as_str().to_string(),
        })
        .collect();

        let mut exits = Vec::new();
        for (direction, target_key) in &location.spatial_exits {
            if let Ok(target) = managers.locations.get(conn, target_key.as_str()).await {
                exits.push(ExitEntry {
                    direction: *direction,
                    key: target.key.as_str().to_string(),
                    display: target.display_name,
                });
            }
        }

        let visible_equipment = managers
            .items
            .visible_equipment(conn, player_key)
            .await?
            .into_iter()
            .map(|key| key.into_string())
            .collect();

        let needs = managers.needs.get_or_init(conn, player_key).await?;
        let needs_alerts = needs
            .alerts(NEEDS_ALERT_THRESHOLD)
            .into_iter()
            .map(|(kind, level)| format!("{} ({:.0})", kind, level))
            .collect();

        let clock = managers.time.clock(conn).await?;
        let appointments = managers
            .quests
            .upcoming(conn, player_key, &clock, APPOINTMENT_WINDOW_MINUTES)
            .await?
            .into_iter()
            .map(|appt| {
                format!(
                    "day {} {:02}:{:02} at {}: {}",
                    appt.day,
                    appt.time_minutes / 60,
                    appt.time_minutes % 60,
                    appt.location,
                    appt.description
                )
            })
            .collect();

        let condition = format!("{}/{} hp", player.hit_points, player.max_hit_points);

        Ok(NarratorManifest {
            location: ManifestEntry {
                key: location.key.as_str().to_string(),
                display: location.display_name,
                summary: location.description,
            },
            npcs,
            items_at_location,
            inventory,
            storages,
            exits,
            player: PlayerSummary {
                key: player.key.as_str().to_string(),
                display: player.display_name,
                visible_equipment,
                condition,
                needs_alerts,
                appointments,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::test_support::seed_session;

    #[tokio::test]
    async fn test_manifest_lists_scene_contents() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let manifest = ManifestBuilder::build(&mut conn, &ctx.managers, "tavern", "player")
            .await
            .unwrap();

        assert_eq!(manifest.location.key, "tavern");
        assert!(manifest.contains_key("bartender_001"));
        assert!(manifest.contains_key("rusty_key"));
        assert!(manifest.contains_key("tavern_chest"));
        assert!(manifest.contains_key("street"));
        assert!(!manifest.contains_key("cellar_rat"));
    }

    #[tokio::test]
    async fn test_manifest_excludes_dead_npcs() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        ctx.managers
            .death
            .kill(&mut conn, "bartender_001")
            .await
            .unwrap();
        let manifest = ManifestBuilder::build(&mut conn, &ctx.managers, "tavern", "player")
            .await
            .unwrap();
        assert!(!manifest.npcs.iter().any(|n| n.key == "bartender_001"));
    }

    #[tokio::test]
    async fn test_prompt_block_carries_tags() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let manifest = ManifestBuilder::build(&mut conn, &ctx.managers, "tavern", "player")
            .await
            .unwrap();
        let block = manifest.prompt_block();
        assert!(block.contains("[bartender_001:Marcus]"));
        assert!(block.contains("[tavern:The Salted Eel]"));
    }

    #[tokio::test]
    async fn test_low_needs_surface_as_alerts() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let sid = ctx.session_id.to_string();

        let mut needs = ctx
            .managers
            .needs
            .get_or_init(&mut conn, "player")
            .await
            .unwrap();
        needs.set_level(fateweaver_domain::NeedKind::Thirst, 10.0);
        crate::store::needs::upsert(&mut conn, &sid, "player", &needs)
            .await
            .unwrap();

        let manifest = ManifestBuilder::build(&mut conn, &ctx.managers, "tavern", "player")
            .await
            .unwrap();
        assert!(manifest
            .player
            .needs_alerts
            .iter()
            .any(|alert| alert.contains("thirst")));
    }
}
