//! Character needs simulation types.
//!
//! Ten scalar needs on a 0-100 scale (100 = fully satisfied). The engine
//! treats these as delta sinks and context sources only; all mutation goes
//! through the needs manager.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The ten tracked needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedKind {
    Hunger,
    Thirst,
    Energy,
    Hygiene,
    Bladder,
    Social,
    Fun,
    Comfort,
    Safety,
    Purpose,
}

impl NeedKind {
    pub const ALL: [NeedKind; 10] = [
        NeedKind::Hunger,
        NeedKind::Thirst,
        NeedKind::Energy,
        NeedKind::Hygiene,
        NeedKind::Bladder,
        NeedKind::Social,
        NeedKind::Fun,
        NeedKind::Comfort,
        NeedKind::Safety,
        NeedKind::Purpose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NeedKind::Hunger => "hunger",
            NeedKind::Thirst => "thirst",
            NeedKind::Energy => "energy",
            NeedKind::Hygiene => "hygiene",
            NeedKind::Bladder => "bladder",
            NeedKind::Social => "social",
            NeedKind::Fun => "fun",
            NeedKind::Comfort => "comfort",
            NeedKind::Safety => "safety",
            NeedKind::Purpose => "purpose",
        }
    }

    /// Baseline decay in points per game hour of idle activity.
    pub fn decay_per_hour(&self) -> f32 {
        match self {
            NeedKind::Hunger => 3.0,
            NeedKind::Thirst => 4.0,
            NeedKind::Energy => 2.5,
            NeedKind::Hygiene => 1.5,
            NeedKind::Bladder => 5.0,
            NeedKind::Social => 1.0,
            NeedKind::Fun => 1.5,
            NeedKind::Comfort => 1.0,
            NeedKind::Safety => 0.5,
            NeedKind::Purpose => 0.5,
        }
    }
}

impl std::str::FromStr for NeedKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hunger" => Ok(Self::Hunger),
            "thirst" => Ok(Self::Thirst),
            "energy" => Ok(Self::Energy),
            "hygiene" => Ok(Self::Hygiene),
            "bladder" => Ok(Self::Bladder),
            "social" => Ok(Self::Social),
            "fun" => Ok(Self::Fun),
            "comfort" => Ok(Self::Comfort),
            "safety" => Ok(Self::Safety),
            "purpose" => Ok(Self::Purpose),
            _ => Err(DomainError::parse(format!("Unknown need: {}", s))),
        }
    }
}

impl std::fmt::Display for NeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quality tier of a need-satisfying activity, scaling the applied delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatisfyQuality {
    Poor,
    Adequate,
    Good,
    Excellent,
}

impl SatisfyQuality {
    /// Multiplier applied to the base satisfaction amount.
    pub fn multiplier(&self) -> f32 {
        match self {
            SatisfyQuality::Poor => 0.5,
            SatisfyQuality::Adequate => 1.0,
            SatisfyQuality::Good => 1.5,
            SatisfyQuality::Excellent => 2.0,
        }
    }
}

/// The full needs state for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterNeeds {
    /// Current level per need, 0-100 (100 = satisfied).
    pub levels: BTreeMap<NeedKind, f32>,
    /// Turn number when each need was last surfaced to the player.
    pub last_communicated: BTreeMap<NeedKind, u32>,
    /// Craving intensity per need, 0-100. Builds as a need stays low.
    pub cravings: BTreeMap<NeedKind, f32>,
}

impl CharacterNeeds {
    /// All needs fully satisfied, no cravings.
    pub fn fresh() -> Self {
        let mut levels = BTreeMap::new();
        for kind in NeedKind::ALL {
            levels.insert(kind, 100.0);
        }
        Self {
            levels,
            last_communicated: BTreeMap::new(),
            cravings: BTreeMap::new(),
        }
    }

    pub fn level(&self, kind: NeedKind) -> f32 {
        self.levels.get(&kind).copied().unwrap_or(100.0)
    }

    /// Set a need level, clamped to 0-100.
    pub fn set_level(&mut self, kind: NeedKind, value: f32) {
        self.levels.insert(kind, value.clamp(0.0, 100.0));
    }

    /// Apply a signed delta to one need, clamped to 0-100.
    pub fn adjust(&mut self, kind: NeedKind, delta: f32) {
        let current = self.level(kind);
        self.set_level(kind, current + delta);
    }

    /// Needs below the alert threshold, worst first.
    pub fn alerts(&self, threshold: f32) -> Vec<(NeedKind, f32)> {
        let mut low: Vec<(NeedKind, f32)> = NeedKind::ALL
            .into_iter()
            .map(|kind| (kind, self.level(kind)))
            .filter(|(_, level)| *level < threshold)
            .collect();
        low.sort_by(|a, b| a.1.total_cmp(&b.1));
        low
    }
}

impl Default for CharacterNeeds {
    fn default() -> Self {
        Self::fresh()
    }
}
