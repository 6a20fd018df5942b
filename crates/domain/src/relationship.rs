//! Directed attitudes between entities.
//!
//! Each ordered pair of entities carries six attitude dimensions on a 0-100
//! scale. Every change appends a history record through the relationship
//! manager.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::keys::EntityKey;

/// The six attitude dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttitudeDimension {
    Trust,
    Liking,
    Respect,
    Fear,
    Familiarity,
    RomanticInterest,
}

impl AttitudeDimension {
    pub const ALL: [AttitudeDimension; 6] = [
        AttitudeDimension::Trust,
        AttitudeDimension::Liking,
        AttitudeDimension::Respect,
        AttitudeDimension::Fear,
        AttitudeDimension::Familiarity,
        AttitudeDimension::RomanticInterest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttitudeDimension::Trust => "trust",
            AttitudeDimension::Liking => "liking",
            AttitudeDimension::Respect => "respect",
            AttitudeDimension::Fear => "fear",
            AttitudeDimension::Familiarity => "familiarity",
            AttitudeDimension::RomanticInterest => "romantic_interest",
        }
    }
}

impl std::str::FromStr for AttitudeDimension {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trust" => Ok(Self::Trust),
            "liking" => Ok(Self::Liking),
            "respect" => Ok(Self::Respect),
            "fear" => Ok(Self::Fear),
            "familiarity" => Ok(Self::Familiarity),
            "romantic_interest" | "romance" => Ok(Self::RomanticInterest),
            _ => Err(DomainError::parse(format!(
                "Unknown attitude dimension: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for AttitudeDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entity's attitude toward another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attitude {
    pub trust: u8,
    pub liking: u8,
    pub respect: u8,
    pub fear: u8,
    pub familiarity: u8,
    pub romantic_interest: u8,
}

impl Attitude {
    /// Neutral first-impression attitude toward a stranger.
    pub fn stranger() -> Self {
        Self {
            trust: 30,
            liking: 50,
            respect: 40,
            fear: 10,
            familiarity: 0,
            romantic_interest: 0,
        }
    }

    pub fn get(&self, dimension: AttitudeDimension) -> u8 {
        match dimension {
            AttitudeDimension::Trust => self.trust,
            AttitudeDimension::Liking => self.liking,
            AttitudeDimension::Respect => self.respect,
            AttitudeDimension::Fear => self.fear,
            AttitudeDimension::Familiarity => self.familiarity,
            AttitudeDimension::RomanticInterest => self.romantic_interest,
        }
    }

    /// Apply a signed delta to one dimension, clamping to 0-100.
    ///
    /// Returns the actually-applied delta after clamping.
    pub fn apply(&mut self, dimension: AttitudeDimension, delta: i32) -> i32 {
        let old = i32::from(self.get(dimension));
        let new = (old + delta).clamp(0, 100);
        let value = new as u8;
        match dimension {
            AttitudeDimension::Trust => self.trust = value,
            AttitudeDimension::Liking => self.liking = value,
            AttitudeDimension::Respect => self.respect = value,
            AttitudeDimension::Fear => self.fear = value,
            AttitudeDimension::Familiarity => self.familiarity = value,
            AttitudeDimension::RomanticInterest => self.romantic_interest = value,
        }
        new - old
    }

    /// Whether this attitude reads as hostile (used for disadvantage on
    /// social checks in the holder's presence).
    pub fn is_hostile(&self) -> bool {
        self.liking < 25
    }
}

impl Default for Attitude {
    fn default() -> Self {
        Self::stranger()
    }
}

/// A directed relationship row: `from`'s attitude toward `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_entity: EntityKey,
    pub to_entity: EntityKey,
    pub attitude: Attitude,
    /// Whether the two have formally met.
    pub has_met: bool,
}

impl Relationship {
    /// Create a fresh relationship between two distinct entities.
    pub fn new(from: EntityKey, to: EntityKey) -> Result<Self, DomainError> {
        if from == to {
            return Err(DomainError::invariant(
                "relationship endpoints must be distinct",
            ));
        }
        Ok(Self {
            from_entity: from,
            to_entity: to,
            attitude: Attitude::stranger(),
            has_met: false,
        })
    }
}

/// Append-only record of a single attitude change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipChange {
    pub from_entity: EntityKey,
    pub to_entity: EntityKey,
    pub dimension: AttitudeDimension,
    /// Applied delta after clamping.
    pub delta: i32,
    pub reason: String,
    pub turn_number: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> EntityKey {
        EntityKey::new(s).unwrap()
    }

    #[test]
    fn test_self_relationship_rejected() {
        let result = Relationship::new(key("alice"), key("alice"));
        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn test_apply_clamps_high() {
        let mut attitude = Attitude::stranger();
        let applied = attitude.apply(AttitudeDimension::Liking, 200);
        assert_eq!(attitude.liking, 100);
        assert_eq!(applied, 50);
    }

    #[test]
    fn test_apply_clamps_low() {
        let mut attitude = Attitude::stranger();
        let applied = attitude.apply(AttitudeDimension::Trust, -100);
        assert_eq!(attitude.trust, 0);
        assert_eq!(applied, -30);
    }

    #[test]
    fn test_hostility_threshold() {
        let mut attitude = Attitude::stranger();
        assert!(!attitude.is_hostile());
        attitude.apply(AttitudeDimension::Liking, -30);
        assert!(attitude.is_hostile());
    }
}
