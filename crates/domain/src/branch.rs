//! Quantum branches: pre-generated outcome bundles.
//!
//! A branch is keyed to an anticipated (action, GM decision) pair and holds
//! up to four outcome variants. Collapsing a branch rolls dice, picks one
//! variant and applies its deltas.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checks::{CheckResolution, CheckResult};
use crate::delta::StateDelta;
use crate::error::DomainError;
use crate::keys::LocationKey;
use crate::skills::Skill;

/// Categories of player action the predictor anticipates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    InteractNpc,
    TakeItem,
    UseItem,
    Move,
    Observe,
    Attack,
    #[serde(untagged)]
    Other(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::InteractNpc => "interact_npc",
            ActionType::TakeItem => "take_item",
            ActionType::UseItem => "use_item",
            ActionType::Move => "move",
            ActionType::Observe => "observe",
            ActionType::Attack => "attack",
            ActionType::Other(name) => name,
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "interact_npc" => Self::InteractNpc,
            "take_item" => Self::TakeItem,
            "use_item" => Self::UseItem,
            "move" => Self::Move,
            "observe" => Self::Observe,
            "attack" => Self::Attack,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One anticipated player action with match patterns and a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPrediction {
    pub action_type: ActionType,
    /// Entity, item, or location key the action targets, if any.
    pub target_key: Option<String>,
    /// Display text for the target, used by the matcher's token overlap.
    pub target_display: Option<String>,
    /// Regex alternatives matched against raw player input.
    pub input_patterns: Vec<String>,
    /// 0.0-0.95; ordering key for the anticipation loop.
    pub probability: f32,
    pub reason: String,
}

impl ActionPrediction {
    pub fn new(action_type: ActionType, probability: f32) -> Self {
        Self {
            action_type,
            target_key: None,
            target_display: None,
            input_patterns: Vec::new(),
            probability: probability.clamp(0.0, 0.95),
            reason: String::new(),
        }
    }

    pub fn with_target(
        mut self,
        key: impl Into<String>,
        display: impl Into<String>,
    ) -> Self {
        self.target_key = Some(key.into());
        self.target_display = Some(display.into());
        self
    }
}

/// A GM twist decision attached to an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmDecision {
    /// Stable decision key, e.g. "no_twist" or "theft_accusation".
    pub key: String,
    pub weight: f32,
    /// Fact predicates that justify this twist. Empty only for "no_twist".
    pub grounding_facts: Vec<String>,
    pub description: String,
}

impl GmDecision {
    pub const NO_TWIST: &'static str = "no_twist";

    /// The always-available straightforward outcome.
    pub fn no_twist() -> Self {
        Self {
            key: Self::NO_TWIST.to_string(),
            weight: 0.7,
            grounding_facts: Vec::new(),
            description: "Play the action straight".to_string(),
        }
    }

    pub fn is_no_twist(&self) -> bool {
        self.key == Self::NO_TWIST
    }
}

/// The four possible outcome variants of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantName {
    Success,
    Failure,
    CriticalSuccess,
    CriticalFailure,
}

impl VariantName {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantName::Success => "success",
            VariantName::Failure => "failure",
            VariantName::CriticalSuccess => "critical_success",
            VariantName::CriticalFailure => "critical_failure",
        }
    }
}

impl std::str::FromStr for VariantName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "critical_success" => Ok(Self::CriticalSuccess),
            "critical_failure" => Ok(Self::CriticalFailure),
            _ => Err(DomainError::parse(format!("Unknown variant: {}", s))),
        }
    }
}

/// One concrete outcome: narrative plus the deltas that realize it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeVariant {
    /// Narrative prose with `[key:display]` tags.
    pub narrative: String,
    #[serde(default)]
    pub state_deltas: Vec<StateDelta>,
    #[serde(default)]
    pub requires_dice: bool,
    pub dc: Option<i32>,
    pub skill: Option<Skill>,
    #[serde(default)]
    pub time_passed_minutes: u32,
}

impl OutcomeVariant {
    /// `requires_dice` implies `dc` and `skill` are present.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.requires_dice && (self.dc.is_none() || self.skill.is_none()) {
            return Err(DomainError::invariant(
                "dice-gated variant must carry dc and skill",
            ));
        }
        Ok(())
    }
}

/// Cache key for a branch: location, action, target, decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchKey {
    pub location: LocationKey,
    pub action_type: ActionType,
    pub target: Option<String>,
    pub decision: String,
}

impl BranchKey {
    pub fn new(
        location: LocationKey,
        action_type: ActionType,
        target: Option<String>,
        decision: impl Into<String>,
    ) -> Self {
        Self {
            location,
            action_type,
            target,
            decision: decision.into(),
        }
    }
}

impl std::fmt::Display for BranchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}::{}::{}::{}",
            self.location,
            self.action_type,
            self.target.as_deref().unwrap_or("none"),
            self.decision
        )
    }
}

/// A pre-generated bundle of outcome variants for one (action, decision).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantumBranch {
    pub key: BranchKey,
    pub action: ActionPrediction,
    pub decision: GmDecision,
    pub variants: BTreeMap<VariantName, OutcomeVariant>,
    pub generated_at: DateTime<Utc>,
    /// Session state version at generation time; the staleness key.
    pub state_version: u64,
    pub generation_ms: u64,
}

impl QuantumBranch {
    /// Structural validity: a success variant always, a failure variant when
    /// any variant is dice-gated, and every variant internally consistent.
    pub fn validate(&self) -> Result<(), DomainError> {
        let success = self
            .variants
            .get(&VariantName::Success)
            .ok_or_else(|| DomainError::invariant("branch is missing a success variant"))?;
        for variant in self.variants.values() {
            variant.validate()?;
        }
        if success.requires_dice && !self.variants.contains_key(&VariantName::Failure) {
            return Err(DomainError::invariant(
                "dice-gated branch must carry a failure variant",
            ));
        }
        Ok(())
    }

    /// Whether collapsing this branch rolls dice at all.
    pub fn requires_dice(&self) -> bool {
        self.variants.values().any(|v| v.requires_dice)
    }

    /// The success variant's dice parameters, if dice-gated.
    pub fn dice_parameters(&self) -> Option<(Skill, i32)> {
        let success = self.variants.get(&VariantName::Success)?;
        if !success.requires_dice {
            return None;
        }
        Some((success.skill.clone()?, success.dc?))
    }

    /// Map a check result to the variant that plays out.
    ///
    /// Criticals pick the dedicated variant when the branch exposes one,
    /// otherwise fall through to success/failure by margin tier.
    pub fn select_variant(&self, check: &CheckResult) -> (VariantName, &OutcomeVariant) {
        let name = match check.resolution {
            CheckResolution::CriticalSuccess
                if self.variants.contains_key(&VariantName::CriticalSuccess) =>
            {
                VariantName::CriticalSuccess
            }
            CheckResolution::CriticalFailure
                if self.variants.contains_key(&VariantName::CriticalFailure) =>
            {
                VariantName::CriticalFailure
            }
            _ if check.is_success() => VariantName::Success,
            _ => VariantName::Failure,
        };
        let variant = self
            .variants
            .get(&name)
            .or_else(|| self.variants.get(&VariantName::Success))
            .unwrap_or_else(|| unreachable!("validated branch always has a success variant"));
        (name, variant)
    }
}
