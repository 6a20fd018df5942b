//! Character attributes and proficiency scaling.
//!
//! Attributes and proficiencies both live on a 0-100 scale. Checks convert
//! them to small modifiers added onto 2d10 rolls.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The six core attributes carried by every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    pub might: u8,
    pub agility: u8,
    pub endurance: u8,
    pub wits: u8,
    pub presence: u8,
    pub resolve: u8,
}

impl Attributes {
    /// All attributes at the baseline of 50.
    pub fn baseline() -> Self {
        Self {
            might: 50,
            agility: 50,
            endurance: 50,
            wits: 50,
            presence: 50,
            resolve: 50,
        }
    }

    /// Fetch an attribute score by kind.
    pub fn get(&self, kind: AttributeKind) -> u8 {
        match kind {
            AttributeKind::Might => self.might,
            AttributeKind::Agility => self.agility,
            AttributeKind::Endurance => self.endurance,
            AttributeKind::Wits => self.wits,
            AttributeKind::Presence => self.presence,
            AttributeKind::Resolve => self.resolve,
        }
    }

    /// Set an attribute score, clamped to 0-100.
    pub fn set(&mut self, kind: AttributeKind, value: u8) {
        let value = value.min(100);
        match kind {
            AttributeKind::Might => self.might = value,
            AttributeKind::Agility => self.agility = value,
            AttributeKind::Endurance => self.endurance = value,
            AttributeKind::Wits => self.wits = value,
            AttributeKind::Presence => self.presence = value,
            AttributeKind::Resolve => self.resolve = value,
        }
    }

    /// Check modifier for an attribute: (score - 50) / 10, so 0 maps to -5
    /// and 100 maps to +5.
    pub fn modifier(&self, kind: AttributeKind) -> i32 {
        (i32::from(self.get(kind)) - 50) / 10
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self::baseline()
    }
}

/// Names of the six attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Might,
    Agility,
    Endurance,
    Wits,
    Presence,
    Resolve,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 6] = [
        AttributeKind::Might,
        AttributeKind::Agility,
        AttributeKind::Endurance,
        AttributeKind::Wits,
        AttributeKind::Presence,
        AttributeKind::Resolve,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Might => "might",
            AttributeKind::Agility => "agility",
            AttributeKind::Endurance => "endurance",
            AttributeKind::Wits => "wits",
            AttributeKind::Presence => "presence",
            AttributeKind::Resolve => "resolve",
        }
    }
}

impl std::str::FromStr for AttributeKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "might" => Ok(Self::Might),
            "agility" => Ok(Self::Agility),
            "endurance" => Ok(Self::Endurance),
            "wits" => Ok(Self::Wits),
            "presence" => Ok(Self::Presence),
            "resolve" => Ok(Self::Resolve),
            _ => Err(DomainError::parse(format!("Unknown attribute: {}", s))),
        }
    }
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a 0-100 proficiency score to a flat check bonus.
///
/// 0-19 -> +0, 20-39 -> +1, 40-59 -> +2, 60-79 -> +3, 80-99 -> +4, 100 -> +5.
pub fn proficiency_bonus(score: u8) -> i32 {
    match score.min(100) {
        100 => 5,
        s => i32::from(s) / 20,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_modifier_is_zero() {
        let attrs = Attributes::baseline();
        for kind in AttributeKind::ALL {
            assert_eq!(attrs.modifier(kind), 0);
        }
    }

    #[test]
    fn test_modifier_extremes() {
        let mut attrs = Attributes::baseline();
        attrs.set(AttributeKind::Might, 100);
        assert_eq!(attrs.modifier(AttributeKind::Might), 5);
        attrs.set(AttributeKind::Might, 0);
        assert_eq!(attrs.modifier(AttributeKind::Might), -5);
    }

    #[test]
    fn test_set_clamps_to_100() {
        let mut attrs = Attributes::baseline();
        attrs.set(AttributeKind::Wits, 250);
        assert_eq!(attrs.get(AttributeKind::Wits), 100);
    }

    #[test]
    fn test_proficiency_bonus_tiers() {
        assert_eq!(proficiency_bonus(0), 0);
        assert_eq!(proficiency_bonus(19), 0);
        assert_eq!(proficiency_bonus(20), 1);
        assert_eq!(proficiency_bonus(39), 1);
        assert_eq!(proficiency_bonus(40), 2);
        assert_eq!(proficiency_bonus(59), 2);
        assert_eq!(proficiency_bonus(60), 3);
        assert_eq!(proficiency_bonus(79), 3);
        assert_eq!(proficiency_bonus(80), 4);
        assert_eq!(proficiency_bonus(99), 4);
        assert_eq!(proficiency_bonus(100), 5);
    }

    #[test]
    fn test_attribute_kind_round_trip() {
        for kind in AttributeKind::ALL {
            let parsed: AttributeKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }
}
