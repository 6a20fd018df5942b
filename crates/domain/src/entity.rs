//! Entities: the player, NPCs, monsters, and notable objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attributes::Attributes;
use crate::error::DomainError;
use crate::keys::{EntityKey, LocationKey};
use crate::skills::Skill;

/// What kind of thing an entity is. Exactly one `player` exists per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Npc,
    Monster,
    Object,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Npc => "npc",
            EntityKind::Monster => "monster",
            EntityKind::Object => "object",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "player" => Ok(Self::Player),
            "npc" => Ok(Self::Npc),
            "monster" => Ok(Self::Monster),
            "object" => Ok(Self::Object),
            _ => Err(DomainError::parse(format!("Unknown entity kind: {}", s))),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical appearance. Dedicated fields are the source of truth; `extra`
/// mirrors anything the setting wants beyond them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appearance {
    pub height: Option<String>,
    pub build: Option<String>,
    pub hair: Option<String>,
    pub eyes: Option<String>,
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

/// A living (or once-living, or inanimate-but-notable) thing in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub key: EntityKey,
    pub display_name: String,
    pub kind: EntityKind,
    pub is_alive: bool,
    pub is_active: bool,
    pub attributes: Attributes,
    /// Proficiency scores (0-100) per trained skill.
    pub skills: BTreeMap<Skill, u8>,
    pub appearance: Appearance,
    pub background: String,
    pub personality: String,
    pub hit_points: i32,
    pub max_hit_points: i32,
    pub location: Option<LocationKey>,
}

impl Entity {
    /// A minimally-specified NPC at a location.
    pub fn npc(key: EntityKey, display_name: impl Into<String>, location: LocationKey) -> Self {
        Self {
            key,
            display_name: display_name.into(),
            kind: EntityKind::Npc,
            is_alive: true,
            is_active: true,
            attributes: Attributes::baseline(),
            skills: BTreeMap::new(),
            appearance: Appearance::default(),
            background: String::new(),
            personality: String::new(),
            hit_points: 20,
            max_hit_points: 20,
            location: Some(location),
        }
    }

    /// The player entity.
    pub fn player(key: EntityKey, display_name: impl Into<String>, location: LocationKey) -> Self {
        Self {
            kind: EntityKind::Player,
            ..Self::npc(key, display_name, location)
        }
    }

    /// Proficiency score for a skill (untrained = 0).
    pub fn proficiency(&self, skill: &Skill) -> u8 {
        self.skills.get(skill).copied().unwrap_or(0)
    }

    /// Combined check modifier for a skill: attribute modifier + proficiency
    /// bonus.
    pub fn check_modifier(&self, skill: &Skill) -> i32 {
        self.attributes.modifier(skill.attribute())
            + crate::attributes::proficiency_bonus(self.proficiency(skill))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeKind;

    #[test]
    fn test_check_modifier_combines_attribute_and_proficiency() {
        let mut npc = Entity::npc(
            EntityKey::new("guard_01").unwrap(),
            "Guard",
            LocationKey::new("gate").unwrap(),
        );
        npc.attributes.set(AttributeKind::Agility, 70); // +2
        npc.skills.insert(Skill::Lockpicking, 45); // +2
        assert_eq!(npc.check_modifier(&Skill::Lockpicking), 4);
    }

    #[test]
    fn test_untrained_skill_has_no_proficiency() {
        let npc = Entity::npc(
            EntityKey::new("guard_01").unwrap(),
            "Guard",
            LocationKey::new("gate").unwrap(),
        );
        assert_eq!(npc.proficiency(&Skill::Arcana), 0);
    }
}
