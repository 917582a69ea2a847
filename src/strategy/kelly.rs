//! Stake sizing.
//!
//! Fixed staking returns the base unit. Fractional Kelly sizes from the
//! model probability and the decimal price, capping the fraction and the
//! absolute stake, and falls back to fixed when Kelly has nothing usable
//! to work with.

use tracing::debug;

use crate::config::StakingConfig;
use crate::types::StakeStrategy;

/// Floor on a Kelly stake so a pick never carries a functionally-zero stake.
pub const MIN_STAKE: f64 = 1e-4;

// ---------------------------------------------------------------------------
// Stake decision
// ---------------------------------------------------------------------------

/// Stake plus the Kelly diagnostics recorded on the pick.
///
/// Diagnostics are kept even when the pick fell back to fixed staking, so
/// analytics can see why.
#[derive(Debug, Clone, PartialEq)]
pub struct StakeDecision {
    pub stake: f64,
    pub strategy: StakeStrategy,
    /// Raw Kelly fraction: (odds·p − 1) / b
    pub kelly_fraction: Option<f64>,
    /// Fraction after `fraction_cap`
    pub kelly_fraction_capped: Option<f64>,
    pub kelly_prob: Option<f64>,
    /// Net odds: decimal_odds − 1
    pub kelly_b: Option<f64>,
}

// ---------------------------------------------------------------------------
// Staking policy
// ---------------------------------------------------------------------------

pub struct StakingPolicy {
    config: StakingConfig,
}

impl StakingPolicy {
    pub fn new(config: StakingConfig) -> Self {
        Self { config }
    }

    fn fixed(&self) -> StakeDecision {
        StakeDecision {
            stake: self.config.base_units,
            strategy: StakeStrategy::Fixed,
            kelly_fraction: None,
            kelly_fraction_capped: None,
            kelly_prob: None,
            kelly_b: None,
        }
    }

    /// Size a stake for a price and an optional model probability.
    ///
    /// Kelly formula: f* = (odds·p − 1) / b, where b = odds − 1.
    pub fn stake(&self, decimal_odds: f64, model_prob: Option<f64>) -> StakeDecision {
        if !self.config.kelly_enabled {
            return self.fixed();
        }

        let b = decimal_odds - 1.0;
        let mut decision = StakeDecision {
            kelly_prob: model_prob,
            kelly_b: Some(b),
            ..self.fixed()
        };

        let p = match model_prob {
            Some(p) if p > 0.0 && p < 1.0 => p,
            _ => {
                debug!(decimal_odds, ?model_prob, "No usable model probability, fixed stake");
                return decision;
            }
        };
        if !(b > 0.0) {
            debug!(decimal_odds, "Non-positive net odds, fixed stake");
            return decision;
        }

        let fraction = (decimal_odds * p - 1.0) / b;
        let capped = fraction.min(self.config.fraction_cap);
        decision.kelly_fraction = Some(fraction);
        decision.kelly_fraction_capped = Some(capped);

        // Negative Kelly means the price doesn't justify a sized bet
        if fraction <= 0.0 {
            debug!(decimal_odds, p, fraction, "Non-positive Kelly fraction, fixed stake");
            return decision;
        }

        let stake = (capped * self.config.base_units)
            .min(self.config.max_units)
            .max(MIN_STAKE);

        debug!(
            decimal_odds,
            p,
            raw_kelly = format!("{:.2}%", fraction * 100.0),
            capped = format!("{:.2}%", capped * 100.0),
            stake = format!("{:.4}u", stake),
            "Kelly stake sized"
        );

        decision.stake = stake;
        decision.strategy = StakeStrategy::Kelly;
        decision
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn kelly(fraction_cap: f64, max_units: f64) -> StakingPolicy {
        StakingPolicy::new(StakingConfig {
            kelly_enabled: true,
            base_units: 1.0,
            max_units,
            fraction_cap,
        })
    }

    #[test]
    fn test_fixed_mode_ignores_probability() {
        let policy = StakingPolicy::new(StakingConfig {
            kelly_enabled: false,
            base_units: 1.5,
            ..Default::default()
        });
        let d = policy.stake(2.2, Some(0.9));
        assert_eq!(d.stake, 1.5);
        assert_eq!(d.strategy, StakeStrategy::Fixed);
        assert!(d.kelly_fraction.is_none());
        assert!(d.kelly_b.is_none());
    }

    #[test]
    fn test_kelly_example() {
        let d = kelly(0.25, 3.0).stake(2.2, Some(0.55));
        assert_eq!(d.strategy, StakeStrategy::Kelly);
        assert!((d.kelly_fraction.unwrap() - 0.175).abs() < 1e-9);
        assert!((d.stake - 0.175).abs() < 1e-9);
        assert!((d.kelly_b.unwrap() - 1.2).abs() < 1e-12);
        assert_eq!(d.kelly_prob, Some(0.55));
    }

    #[test]
    fn test_fraction_capped() {
        let d = kelly(0.1, 3.0).stake(3.0, Some(0.6));
        // f* = (1.8 - 1) / 2 = 0.4, capped to 0.1
        assert!((d.kelly_fraction.unwrap() - 0.4).abs() < 1e-9);
        assert_eq!(d.kelly_fraction_capped, Some(0.1));
        assert!((d.stake - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_absolute_stake_capped() {
        let policy = StakingPolicy::new(StakingConfig {
            kelly_enabled: true,
            base_units: 10.0,
            max_units: 2.0,
            fraction_cap: 1.0,
        });
        let d = policy.stake(3.0, Some(0.6));
        assert_eq!(d.stake, 2.0);
        assert_eq!(d.strategy, StakeStrategy::Kelly);
    }

    #[test]
    fn test_tiny_stake_floored() {
        let d = kelly(0.25, 3.0).stake(2.0, Some(0.500_01));
        assert_eq!(d.strategy, StakeStrategy::Kelly);
        assert_eq!(d.stake, MIN_STAKE);
    }

    #[test]
    fn test_negative_kelly_falls_back_with_diagnostics() {
        let d = kelly(0.25, 3.0).stake(2.0, Some(0.4));
        assert_eq!(d.strategy, StakeStrategy::Fixed);
        assert_eq!(d.stake, 1.0);
        assert!(d.kelly_fraction.unwrap() < 0.0);
        assert!(d.kelly_fraction_capped.is_some());
        assert_eq!(d.kelly_prob, Some(0.4));
        assert_eq!(d.kelly_b, Some(1.0));
    }

    #[test]
    fn test_invalid_probability_falls_back() {
        for p in [None, Some(0.0), Some(1.0), Some(-0.2), Some(1.3)] {
            let d = kelly(0.25, 3.0).stake(2.5, p);
            assert_eq!(d.strategy, StakeStrategy::Fixed, "p={p:?}");
            assert_eq!(d.stake, 1.0);
            assert!(d.kelly_fraction.is_none());
            assert_eq!(d.kelly_b, Some(1.5));
        }
    }

    #[test]
    fn test_non_positive_b_falls_back() {
        let d = kelly(0.25, 3.0).stake(1.0, Some(0.7));
        assert_eq!(d.strategy, StakeStrategy::Fixed);
        assert_eq!(d.kelly_b, Some(0.0));
        assert!(d.kelly_fraction.is_none());
    }

    #[test]
    fn test_staking_config_default() {
        let config = StakingConfig::default();
        assert_eq!(config.base_units, 1.0);
        assert_eq!(config.max_units, 3.0);
        assert_eq!(config.fraction_cap, 0.25);
        assert!(!config.kelly_enabled);
    }
}
