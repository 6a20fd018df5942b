//! Subject-predicate-value facts about the world.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// What kind of record a fact is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Entity,
    Item,
    Location,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::Entity => "entity",
            SubjectType::Item => "item",
            SubjectType::Location => "location",
        }
    }
}

impl std::str::FromStr for SubjectType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "entity" => Ok(Self::Entity),
            "item" => Ok(Self::Item),
            "location" => Ok(Self::Location),
            _ => Err(DomainError::parse(format!("Unknown subject type: {}", s))),
        }
    }
}

/// An SPV triple keyed to a subject in the session.
///
/// Facts ground GM twists: a twist is only proposed when specific facts
/// justify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub subject_type: SubjectType,
    pub subject_key: String,
    pub predicate: String,
    pub value: String,
    /// Secret facts never surface in manifests shown to the narrator on
    /// behalf of the player.
    pub is_secret: bool,
    /// 0.0-1.0; how established the fact is.
    pub certainty: f32,
    /// Turn the fact was recorded on.
    pub recorded_turn: u32,
}

impl Fact {
    pub fn new(
        subject_type: SubjectType,
        subject_key: impl Into<String>,
        predicate: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            subject_type,
            subject_key: subject_key.into(),
            predicate: predicate.into(),
            value: value.into(),
            is_secret: false,
            certainty: 1.0,
            recorded_turn: 0,
        }
    }

    pub fn secret(mut self) -> Self {
        self.is_secret = true;
        self
    }

    pub fn with_certainty(mut self, certainty: f32) -> Self {
        self.certainty = certainty.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certainty_clamped() {
        let fact =
            Fact::new(SubjectType::Location, "tavern", "recent_theft", "true").with_certainty(1.7);
        assert_eq!(fact.certainty, 1.0);
    }

    #[test]
    fn test_secret_builder() {
        let fact = Fact::new(SubjectType::Entity, "innkeep_01", "npc_has_secret", "smuggler")
            .secret();
        assert!(fact.is_secret);
    }
}
