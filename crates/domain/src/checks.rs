//! 2d10 skill check engine.
//!
//! Checks roll 2d10 + attribute modifier + proficiency bonus against a DC.
//! Advantage rolls 3d10 keep best 2, disadvantage keeps worst 2. Double
//! natural 10s and double natural 1s are criticals. If the DC is low enough
//! that a 10 on the dice would pass, the check auto-succeeds without
//! consuming randomness (take-10).
//!
//! The die roller is injected as a closure so the engine supplies real
//! randomness and tests force exact faces.

use serde::{Deserialize, Serialize};

use crate::skills::Skill;

/// Advantage state for a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

/// Margin tier for (total - DC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginTier {
    Exceptional,
    ClearSuccess,
    NarrowSuccess,
    BareSuccess,
    PartialFailure,
    ClearFailure,
    Catastrophic,
}

impl MarginTier {
    /// Tier for a signed margin (total - DC).
    pub fn from_margin(margin: i32) -> Self {
        match margin {
            m if m >= 10 => MarginTier::Exceptional,
            5..=9 => MarginTier::ClearSuccess,
            1..=4 => MarginTier::NarrowSuccess,
            0 => MarginTier::BareSuccess,
            -4..=-1 => MarginTier::PartialFailure,
            -9..=-5 => MarginTier::ClearFailure,
            _ => MarginTier::Catastrophic,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            MarginTier::Exceptional
                | MarginTier::ClearSuccess
                | MarginTier::NarrowSuccess
                | MarginTier::BareSuccess
        )
    }
}

/// How a check resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckResolution {
    /// DC was within take-10 reach; no dice were rolled.
    AutoSuccess,
    /// Both kept dice showed 10.
    CriticalSuccess,
    /// Both kept dice showed 1.
    CriticalFailure,
    /// Ordinary margin-tier resolution.
    Rolled,
}

/// Full result of a skill check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub skill: Skill,
    pub dc: i32,
    /// Every die rolled, in order (empty for auto-success).
    pub rolls: Vec<u8>,
    /// The two dice that counted.
    pub kept: Vec<u8>,
    pub modifier: i32,
    pub total: i32,
    pub margin: i32,
    pub tier: MarginTier,
    pub resolution: CheckResolution,
    pub advantage: Advantage,
}

impl CheckResult {
    pub fn is_success(&self) -> bool {
        match self.resolution {
            CheckResolution::AutoSuccess | CheckResolution::CriticalSuccess => true,
            CheckResolution::CriticalFailure => false,
            CheckResolution::Rolled => self.tier.is_success(),
        }
    }

    /// Breakdown string, e.g. "2d10[7, 6] + 5 = 18 vs DC 15".
    pub fn breakdown(&self) -> String {
        if self.resolution == CheckResolution::AutoSuccess {
            return format!("take-10 + {} vs DC {}", self.modifier, self.dc);
        }
        let rolls: Vec<String> = self.kept.iter().map(|r| r.to_string()).collect();
        let die_count = if self.advantage == Advantage::Normal {
            "2d10"
        } else {
            "3d10k2"
        };
        if self.modifier >= 0 {
            format!(
                "{}[{}] + {} = {} vs DC {}",
                die_count,
                rolls.join(", "),
                self.modifier,
                self.total,
                self.dc
            )
        } else {
            format!(
                "{}[{}] - {} = {} vs DC {}",
                die_count,
                rolls.join(", "),
                -self.modifier,
                self.total,
                self.dc
            )
        }
    }
}

/// Perform a skill check.
///
/// `modifier` is the combined attribute modifier + proficiency bonus.
/// `roll_d10` returns a face 1-10 per call. The take-10 rule fires before
/// any die is rolled: if `dc <= 10 + modifier` the check is an automatic
/// success and `roll_d10` is never called.
pub fn skill_check(
    skill: Skill,
    dc: i32,
    modifier: i32,
    advantage: Advantage,
    roll_d10: &mut dyn FnMut() -> u8,
) -> CheckResult {
    if dc <= 10 + modifier {
        return CheckResult {
            skill,
            dc,
            rolls: vec![],
            kept: vec![],
            modifier,
            total: 10 + modifier,
            margin: 10 + modifier - dc,
            tier: MarginTier::from_margin(10 + modifier - dc),
            resolution: CheckResolution::AutoSuccess,
            advantage,
        };
    }

    let die_count = match advantage {
        Advantage::Normal => 2,
        Advantage::Advantage | Advantage::Disadvantage => 3,
    };
    let rolls: Vec<u8> = (0..die_count).map(|_| roll_d10().clamp(1, 10)).collect();

    let mut sorted = rolls.clone();
    sorted.sort_unstable();
    let kept: Vec<u8> = match advantage {
        Advantage::Normal => rolls.clone(),
        Advantage::Advantage => sorted[1..].to_vec(),
        Advantage::Disadvantage => sorted[..2].to_vec(),
    };

    let natural: i32 = kept.iter().map(|&d| i32::from(d)).sum();
    let total = natural + modifier;
    let margin = total - dc;

    let resolution = if kept.iter().all(|&d| d == 10) {
        CheckResolution::CriticalSuccess
    } else if kept.iter().all(|&d| d == 1) {
        CheckResolution::CriticalFailure
    } else {
        CheckResolution::Rolled
    };

    CheckResult {
        skill,
        dc,
        rolls,
        kept,
        modifier,
        total,
        margin,
        tier: MarginTier::from_margin(margin),
        resolution,
        advantage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Die roller that pops from a script and counts calls.
    struct Script {
        faces: Vec<u8>,
        consumed: usize,
    }

    impl Script {
        fn new(faces: Vec<u8>) -> Self {
            Self { faces, consumed: 0 }
        }

        fn roll(&mut self) -> u8 {
            let face = self.faces[self.consumed % self.faces.len()];
            self.consumed += 1;
            face
        }
    }

    fn check_with(faces: Vec<u8>, dc: i32, modifier: i32, advantage: Advantage) -> CheckResult {
        let mut script = Script::new(faces);
        skill_check(Skill::Lockpicking, dc, modifier, advantage, &mut || {
            script.roll()
        })
    }

    #[test]
    fn test_margin_tiers() {
        assert_eq!(MarginTier::from_margin(12), MarginTier::Exceptional);
        assert_eq!(MarginTier::from_margin(10), MarginTier::Exceptional);
        assert_eq!(MarginTier::from_margin(7), MarginTier::ClearSuccess);
        assert_eq!(MarginTier::from_margin(2), MarginTier::NarrowSuccess);
        assert_eq!(MarginTier::from_margin(0), MarginTier::BareSuccess);
        assert_eq!(MarginTier::from_margin(-3), MarginTier::PartialFailure);
        assert_eq!(MarginTier::from_margin(-7), MarginTier::ClearFailure);
        assert_eq!(MarginTier::from_margin(-10), MarginTier::Catastrophic);
    }

    #[test]
    fn test_take_10_consumes_no_randomness() {
        let mut script = Script::new(vec![1]);
        let result = skill_check(Skill::Persuasion, 12, 3, Advantage::Normal, &mut || {
            script.roll()
        });
        assert_eq!(result.resolution, CheckResolution::AutoSuccess);
        assert!(result.is_success());
        assert_eq!(script.consumed, 0);
        assert!(result.rolls.is_empty());
    }

    #[test]
    fn test_take_10_boundary() {
        // DC exactly 10 + modifier auto-succeeds; one above rolls.
        let auto = check_with(vec![5, 5], 15, 5, Advantage::Normal);
        assert_eq!(auto.resolution, CheckResolution::AutoSuccess);

        let rolled = check_with(vec![5, 5], 16, 5, Advantage::Normal);
        assert_eq!(rolled.resolution, CheckResolution::Rolled);
        assert_eq!(rolled.rolls.len(), 2);
        assert_eq!(rolled.total, 15);
    }

    #[test]
    fn test_clear_success_tier() {
        // 2d10 = 14, +5 = 19 vs DC 16: margin +3, narrow success.
        let result = check_with(vec![7, 7], 16, 5, Advantage::Normal);
        assert_eq!(result.tier, MarginTier::NarrowSuccess);
        assert!(result.is_success());

        // 2d10 = 16, +5 = 21 vs DC 16: margin +5, clear success.
        let result = check_with(vec![8, 8], 16, 5, Advantage::Normal);
        assert_eq!(result.tier, MarginTier::ClearSuccess);
    }

    #[test]
    fn test_critical_success_on_double_tens() {
        let result = check_with(vec![10, 10], 25, 0, Advantage::Normal);
        assert_eq!(result.resolution, CheckResolution::CriticalSuccess);
        assert!(result.is_success());
    }

    #[test]
    fn test_critical_failure_on_double_ones() {
        // Large modifier cannot save a double-1.
        let result = check_with(vec![1, 1], 12, 20, Advantage::Normal);
        assert_eq!(result.resolution, CheckResolution::CriticalFailure);
        assert!(!result.is_success());
    }

    #[test]
    fn test_advantage_keeps_best_two() {
        let result = check_with(vec![3, 9, 6], 18, 0, Advantage::Advantage);
        assert_eq!(result.rolls, vec![3, 9, 6]);
        assert_eq!(result.kept, vec![6, 9]);
        assert_eq!(result.total, 15);
    }

    #[test]
    fn test_disadvantage_keeps_worst_two() {
        let result = check_with(vec![3, 9, 6], 18, 0, Advantage::Disadvantage);
        assert_eq!(result.kept, vec![3, 6]);
        assert_eq!(result.total, 9);
    }

    #[test]
    fn test_advantage_crit_requires_kept_tens() {
        let result = check_with(vec![10, 10, 2], 25, 0, Advantage::Advantage);
        assert_eq!(result.resolution, CheckResolution::CriticalSuccess);

        let result = check_with(vec![10, 2, 10], 25, 0, Advantage::Disadvantage);
        assert_eq!(result.resolution, CheckResolution::Rolled);
    }

    #[test]
    fn test_distribution_mean_and_variance() {
        let mut rng = StdRng::seed_from_u64(1234);
        let n = 1_000_000u32;
        let mut sum = 0f64;
        let mut sum_sq = 0f64;
        let mut single_sum = 0f64;
        let mut single_sum_sq = 0f64;
        for _ in 0..n {
            let result = skill_check(Skill::Perception, 100, 0, Advantage::Normal, &mut || {
                rng.gen_range(1..=10)
            });
            let natural = f64::from(result.total);
            sum += natural;
            sum_sq += natural * natural;
            let die = f64::from(result.kept[0]);
            single_sum += die;
            single_sum_sq += die * die;
        }
        let mean = sum / f64::from(n);
        let variance = sum_sq / f64::from(n) - mean * mean;
        // 2d10: mean 11, variance 16.5; each d10: variance 8.25.
        assert!((mean - 11.0).abs() < 0.05, "mean was {}", mean);
        assert!((variance - 16.5).abs() < 0.2, "variance was {}", variance);

        let single_mean = single_sum / f64::from(n);
        let single_variance = single_sum_sq / f64::from(n) - single_mean * single_mean;
        assert!(
            (single_variance - 8.25).abs() < 0.1,
            "d10 variance was {}",
            single_variance
        );
    }

    #[test]
    fn test_advantage_shifts_mean() {
        let mut rng = StdRng::seed_from_u64(99);
        let n = 200_000u32;
        let mut normal_sum = 0f64;
        let mut advantage_sum = 0f64;
        for _ in 0..n {
            normal_sum += f64::from(
                skill_check(Skill::Perception, 100, 0, Advantage::Normal, &mut || {
                    rng.gen_range(1..=10)
                })
                .total,
            );
            advantage_sum += f64::from(
                skill_check(Skill::Perception, 100, 0, Advantage::Advantage, &mut || {
                    rng.gen_range(1..=10)
                })
                .total,
            );
        }
        let shift = (advantage_sum - normal_sum) / f64::from(n);
        assert!((shift - 2.2).abs() < 0.1, "advantage shift was {}", shift);
    }

    #[test]
    fn test_breakdown_format() {
        let result = check_with(vec![7, 6], 15, 5, Advantage::Normal);
        assert_eq!(result.breakdown(), "2d10[7, 6] + 5 = 18 vs DC 15");
    }
}
