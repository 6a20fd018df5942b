//! Quests and appointments.
//!
//! Minimal records: quests feed action-prediction scoring (quest NPCs,
//! quest items, quest destinations score higher); appointments surface in
//! the player summary when imminent.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::game_time::DayOfWeek;
use crate::keys::{EntityKey, ItemKey, LocationKey, QuestKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Active,
    Completed,
    Failed,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::Active => "active",
            QuestStatus::Completed => "completed",
            QuestStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for QuestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(DomainError::parse(format!("Unknown quest status: {}", s))),
        }
    }
}

/// A tracked objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub key: QuestKey,
    pub name: String,
    pub description: String,
    pub status: QuestStatus,
    /// NPC this quest revolves around, if any.
    pub target_entity: Option<EntityKey>,
    /// Where the quest wants the player to go, if anywhere.
    pub destination: Option<LocationKey>,
    /// Item the quest is about, if any.
    pub quest_item: Option<ItemKey>,
}

/// A scheduled commitment for an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub entity: EntityKey,
    pub day: u32,
    /// Minutes since midnight.
    pub time_minutes: u32,
    pub location: LocationKey,
    pub description: String,
}

/// One recurring schedule entry for an NPC: at `time_minutes` on
/// `day_of_week` the NPC should be at `location`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub entity: EntityKey,
    pub day_of_week: DayOfWeek,
    /// Minutes since midnight when this entry takes effect.
    pub time_minutes: u32,
    pub location: LocationKey,
    pub activity: String,
}
