//! Skills used by dice checks.

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeKind;

/// Skill a check can be keyed to.
///
/// Unknown skill names from LLM output become `Custom` rather than failing
/// the whole branch; custom skills roll against wits with no proficiency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Athletics,
    Melee,
    Ranged,
    Stealth,
    Lockpicking,
    Perception,
    Arcana,
    Survival,
    Medicine,
    Persuasion,
    Deception,
    Intimidation,
    Performance,
    #[serde(untagged)]
    Custom(String),
}

impl Skill {
    /// The attribute this skill keys off.
    pub fn attribute(&self) -> AttributeKind {
        match self {
            Skill::Athletics | Skill::Melee => AttributeKind::Might,
            Skill::Ranged | Skill::Stealth | Skill::Lockpicking => AttributeKind::Agility,
            Skill::Perception | Skill::Arcana | Skill::Survival | Skill::Medicine => {
                AttributeKind::Wits
            }
            Skill::Persuasion | Skill::Deception | Skill::Intimidation | Skill::Performance => {
                AttributeKind::Presence
            }
            Skill::Custom(_) => AttributeKind::Wits,
        }
    }

    /// Social skills are subject to disadvantage when a hostile NPC is present.
    pub fn is_social(&self) -> bool {
        matches!(
            self,
            Skill::Persuasion | Skill::Deception | Skill::Intimidation | Skill::Performance
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Skill::Athletics => "athletics",
            Skill::Melee => "melee",
            Skill::Ranged => "ranged",
            Skill::Stealth => "stealth",
            Skill::Lockpicking => "lockpicking",
            Skill::Perception => "perception",
            Skill::Arcana => "arcana",
            Skill::Survival => "survival",
            Skill::Medicine => "medicine",
            Skill::Persuasion => "persuasion",
            Skill::Deception => "deception",
            Skill::Intimidation => "intimidation",
            Skill::Performance => "performance",
            Skill::Custom(name) => name,
        }
    }
}

impl std::str::FromStr for Skill {
    type Err = std::convert::Infallible;

    /// Parse a skill name (case-insensitive); unknown names become Custom.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "athletics" => Self::Athletics,
            "melee" => Self::Melee,
            "ranged" => Self::Ranged,
            "stealth" => Self::Stealth,
            "lockpicking" => Self::Lockpicking,
            "perception" => Self::Perception,
            "arcana" => Self::Arcana,
            "survival" => Self::Survival,
            "medicine" => Self::Medicine,
            "persuasion" => Self::Persuasion,
            "deception" => Self::Deception,
            "intimidation" => Self::Intimidation,
            "performance" => Self::Performance,
            _ => Self::Custom(s.to_string()),
        })
    }
}

impl std::fmt::Display for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_skills() {
        assert!(Skill::Persuasion.is_social());
        assert!(Skill::Deception.is_social());
        assert!(!Skill::Lockpicking.is_social());
    }

    #[test]
    fn test_unknown_becomes_custom() {
        let skill: Skill = "basket_weaving".parse().unwrap();
        assert_eq!(skill, Skill::Custom("basket_weaving".to_string()));
        assert_eq!(skill.attribute(), AttributeKind::Wits);
    }

    #[test]
    fn test_parse_case_insensitive() {
        let skill: Skill = "Lockpicking".parse().unwrap();
        assert_eq!(skill, Skill::Lockpicking);
    }
}
