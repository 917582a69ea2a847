//! Forward-looking risk views: anomaly flags, a risk-of-ruin
//! approximation, bootstrap equity projection, Kelly uplift and the
//! drawdown stake advisory.
//!
//! None of these act on the ledger. They are reported, and it is up to
//! the operator whether the next cycle's staking changes.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;

use super::aggregate::Aggregate;
use super::distribution::{percentile, sorted};
use super::equity::{stdev, tail, window_volatility, EquityStats};
use crate::config::{
    AdvisoryConfig, AnomalyConfig, MonteCarloConfig, RiskOfRuinConfig, MIN_RISK_OF_RUIN_PICKS,
};
use crate::types::{Pick, StakeStrategy};

// ---------------------------------------------------------------------------
// Anomaly flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyFlags {
    pub drawdown_breach: bool,
    pub yield_drop: bool,
    pub volatility_spike: bool,
    pub any: bool,
    pub current_drawdown_pct: f64,
    pub all_time_yield: f64,
    pub rolling_yield: Option<f64>,
    pub recent_volatility: Option<f64>,
    pub baseline_volatility: Option<f64>,
}

/// `picks` must be chronological settled picks, `deltas` their profits.
pub fn anomalies(
    picks: &[&Pick],
    deltas: &[f64],
    equity: &EquityStats,
    cfg: &AnomalyConfig,
) -> AnomalyFlags {
    let mut flags = AnomalyFlags {
        current_drawdown_pct: equity.current_drawdown_pct,
        ..Default::default()
    };

    flags.drawdown_breach = equity.current_drawdown_pct > cfg.drawdown_pct_threshold;

    let all_time = Aggregate::from_picks(picks.iter().copied()).yield_rate;
    flags.all_time_yield = all_time;
    if cfg.yield_window > 0 && picks.len() >= cfg.yield_window {
        let rolling = Aggregate::from_picks(tail(picks, cfg.yield_window).iter().copied()).yield_rate;
        flags.rolling_yield = Some(rolling);
        flags.yield_drop =
            all_time != 0.0 && (all_time - rolling) > cfg.yield_drop_fraction * all_time.abs();
    }

    if cfg.volatility_baseline_window > 0 && deltas.len() >= cfg.volatility_baseline_window {
        let recent = window_volatility(deltas, cfg.volatility_window);
        let baseline = window_volatility(deltas, cfg.volatility_baseline_window);
        flags.recent_volatility = recent;
        flags.baseline_volatility = baseline;
        if let (Some(r), Some(b)) = (recent, baseline) {
            flags.volatility_spike = b > 0.0 && r > cfg.volatility_multiple * b;
        }
    }

    flags.any = flags.drawdown_breach || flags.yield_drop || flags.volatility_spike;
    flags
}

// ---------------------------------------------------------------------------
// Risk of ruin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskOfRuin {
    /// Diffusion approximation, not an exact ruin probability.
    pub method: &'static str,
    pub probability: f64,
    pub picks: usize,
    pub avg_edge: f64,
    pub avg_stake: f64,
    pub stake_variance: f64,
    pub bankroll_units: f64,
}

/// exp(−2μB/σ²) with drift μ = mean edge × mean stake and σ² the second
/// moment of stake. A non-positive drift is certain ruin.
pub fn risk_of_ruin(picks: &[&Pick], cfg: &RiskOfRuinConfig) -> Option<RiskOfRuin> {
    let n = picks.len();
    if n < cfg.min_picks.max(MIN_RISK_OF_RUIN_PICKS) {
        return None;
    }
    let nf = n as f64;
    let avg_edge = picks.iter().map(|p| p.edge).sum::<f64>() / nf;
    let avg_stake = picks.iter().map(|p| p.stake).sum::<f64>() / nf;
    let stake_variance = picks.iter().map(|p| (p.stake - avg_stake).powi(2)).sum::<f64>() / nf;

    let drift = avg_edge * avg_stake;
    let second_moment = stake_variance + avg_stake * avg_stake;
    let probability = if drift <= 0.0 || second_moment <= 0.0 {
        1.0
    } else {
        (-2.0 * drift * cfg.bankroll_units / second_moment).exp()
    };

    Some(RiskOfRuin {
        method: "diffusion_approximation",
        probability: probability.clamp(0.0, 1.0),
        picks: n,
        avg_edge,
        avg_stake,
        stake_variance,
        bankroll_units: cfg.bankroll_units,
    })
}

// ---------------------------------------------------------------------------
// Monte Carlo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileValue {
    pub p: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloProjection {
    pub runs: usize,
    pub window: usize,
    pub sample_size: usize,
    pub percentiles: Vec<PercentileValue>,
    pub mean_final: f64,
    /// Share of runs finishing below zero.
    pub prob_loss: f64,
}

/// Bootstrap the last `window` outcomes into `runs` simulated equities.
pub fn monte_carlo(
    deltas: &[f64],
    cfg: &MonteCarloConfig,
    rng: &mut StdRng,
) -> Option<MonteCarloProjection> {
    let sample = tail(deltas, cfg.window);
    if sample.is_empty() || cfg.runs == 0 {
        return None;
    }

    let finals: Vec<f64> = (0..cfg.runs)
        .map(|_| {
            (0..sample.len())
                .map(|_| sample[rng.gen_range(0..sample.len())])
                .sum()
        })
        .collect();
    let losing = finals.iter().filter(|&&f| f < 0.0).count();
    let finals = sorted(finals);

    Some(MonteCarloProjection {
        runs: cfg.runs,
        window: cfg.window,
        sample_size: sample.len(),
        percentiles: cfg
            .percentiles
            .iter()
            .filter_map(|&p| percentile(&finals, p).map(|value| PercentileValue { p, value }))
            .collect(),
        mean_final: finals.iter().sum::<f64>() / finals.len() as f64,
        prob_loss: losing as f64 / cfg.runs as f64,
    })
}

// ---------------------------------------------------------------------------
// Kelly effectiveness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KellyEffectiveness {
    pub picks: usize,
    pub realized_profit: f64,
    /// Same outcomes at a flat `base_units` stake.
    pub fixed_profit: f64,
    pub uplift_pct: Option<f64>,
    pub realized_stake_stdev: Option<f64>,
}

pub fn kelly_effectiveness(picks: &[&Pick], base_units: f64) -> Option<KellyEffectiveness> {
    let kelly: Vec<&Pick> = picks
        .iter()
        .copied()
        .filter(|p| p.stake_strategy == StakeStrategy::Kelly && p.settled)
        .collect();
    if kelly.is_empty() {
        return None;
    }

    let realized: f64 = kelly.iter().filter_map(|p| p.net_profit()).sum();
    let fixed: f64 = kelly
        .iter()
        .map(|p| {
            if p.is_win() {
                base_units * (p.decimal_odds - 1.0)
            } else {
                -base_units
            }
        })
        .sum();
    let stakes: Vec<f64> = kelly.iter().map(|p| p.stake).collect();

    Some(KellyEffectiveness {
        picks: kelly.len(),
        realized_profit: realized,
        fixed_profit: fixed,
        uplift_pct: (fixed != 0.0).then(|| (realized - fixed) / fixed.abs()),
        realized_stake_stdev: stdev(&stakes),
    })
}

// ---------------------------------------------------------------------------
// Stake advisory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeAdvisory {
    pub triggered: bool,
    pub current_drawdown_pct: f64,
    pub threshold: f64,
    pub recommended_stake_factor: f64,
}

pub fn stake_advisory(equity: &EquityStats, cfg: &AdvisoryConfig) -> StakeAdvisory {
    let triggered = equity.current_drawdown_pct > cfg.drawdown_pct_threshold;
    StakeAdvisory {
        triggered,
        current_drawdown_pct: equity.current_drawdown_pct,
        threshold: cfg.drawdown_pct_threshold,
        recommended_stake_factor: if triggered { cfg.stake_factor } else { 1.0 },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::equity::{chronological, equity, profit_deltas};
    use chrono::{Duration, Utc};
    use rand::SeedableRng;

    fn history(outcomes: &[bool]) -> Vec<Pick> {
        let t0 = Utc::now() - Duration::days(60);
        outcomes
            .iter()
            .enumerate()
            .map(|(i, &won)| Pick::settled_sample(i as u64, t0 + Duration::hours(i as i64), 2.0, 1.0, won))
            .collect()
    }

    #[test]
    fn test_drawdown_breach_flag() {
        let picks = history(&[true, true, true, true, false, false]);
        let ordered = chronological(&picks);
        let deltas = profit_deltas(&ordered);
        let eq = equity(&ordered);
        // peak 4, current 2 → 50%
        let flags = anomalies(&ordered, &deltas, &eq, &AnomalyConfig::default());
        assert!(flags.drawdown_breach);
        assert!(flags.any);
        // Windows not filled yet.
        assert!(flags.rolling_yield.is_none());
        assert!(!flags.volatility_spike);
    }

    #[test]
    fn test_yield_drop_flag() {
        let mut outcomes = vec![true; 8];
        outcomes.extend([false, false]);
        let picks = history(&outcomes);
        let ordered = chronological(&picks);
        let deltas = profit_deltas(&ordered);
        let eq = equity(&ordered);
        let cfg = AnomalyConfig {
            yield_window: 4,
            ..AnomalyConfig::default()
        };
        let flags = anomalies(&ordered, &deltas, &eq, &cfg);
        // all-time 0.6, last four 0.0
        assert!((flags.all_time_yield - 0.6).abs() < 1e-12);
        assert_eq!(flags.rolling_yield, Some(0.0));
        assert!(flags.yield_drop);
    }

    #[test]
    fn test_volatility_spike_flag() {
        let mut picks = history(&[true; 8]);
        // Calm baseline then alternating big swings.
        for (i, p) in picks.iter_mut().enumerate() {
            p.stake = if i < 4 { 0.1 } else { 2.0 };
            p.payout = Some(p.stake * 2.0);
        }
        picks[5].result = Some(crate::types::PickResult::Loss);
        picks[5].payout = Some(0.0);
        picks[7].result = Some(crate::types::PickResult::Loss);
        picks[7].payout = Some(0.0);

        let ordered = chronological(&picks);
        let deltas = profit_deltas(&ordered);
        let eq = equity(&ordered);
        let cfg = AnomalyConfig {
            volatility_window: 4,
            volatility_baseline_window: 8,
            volatility_multiple: 1.05,
            ..AnomalyConfig::default()
        };
        let flags = anomalies(&ordered, &deltas, &eq, &cfg);
        assert!(flags.recent_volatility.unwrap() > flags.baseline_volatility.unwrap());
        assert!(flags.volatility_spike);
    }

    #[test]
    fn test_risk_of_ruin() {
        let picks = history(&[true; 29]);
        let refs: Vec<&Pick> = picks.iter().collect();
        assert!(risk_of_ruin(&refs, &RiskOfRuinConfig::default()).is_none());

        let picks = history(&[true; 40]);
        let refs: Vec<&Pick> = picks.iter().collect();
        let ror = risk_of_ruin(&refs, &RiskOfRuinConfig::default()).unwrap();
        // μ = 0.05, σ² = 1, B = 50 → exp(−5)
        assert!((ror.probability - (-5.0_f64).exp()).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&ror.probability));

        let mut negative = history(&[true; 40]);
        for p in negative.iter_mut() {
            p.edge = -0.01;
        }
        let refs: Vec<&Pick> = negative.iter().collect();
        assert_eq!(risk_of_ruin(&refs, &RiskOfRuinConfig::default()).unwrap().probability, 1.0);
    }

    #[test]
    fn test_risk_of_ruin_never_below_thirty_picks() {
        let picks = history(&[true; 20]);
        let refs: Vec<&Pick> = picks.iter().collect();
        let cfg = RiskOfRuinConfig {
            min_picks: 5,
            ..RiskOfRuinConfig::default()
        };
        assert!(risk_of_ruin(&refs, &cfg).is_none());
    }

    #[test]
    fn test_monte_carlo_seeded_is_reproducible() {
        let deltas = vec![1.0, -1.0, 0.5, -1.0, 2.0, -1.0];
        let cfg = MonteCarloConfig {
            runs: 200,
            window: 4,
            seed: Some(7),
            ..MonteCarloConfig::default()
        };
        let a = monte_carlo(&deltas, &cfg, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = monte_carlo(&deltas, &cfg, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.sample_size, 4);
        assert_eq!(a.percentiles.len(), 3);
        assert!(a.percentiles[0].value <= a.percentiles[2].value);
        // Bounded by the extremes of the window.
        assert!(a.percentiles[2].value <= 8.0);
        assert!(a.percentiles[0].value >= -4.0);

        assert!(monte_carlo(&[], &cfg, &mut StdRng::seed_from_u64(1)).is_none());
    }

    #[test]
    fn test_kelly_effectiveness() {
        let t = Utc::now();
        let mut a = Pick::settled_sample(1, t, 3.0, 2.0, true);
        a.stake_strategy = StakeStrategy::Kelly;
        let mut b = Pick::settled_sample(2, t, 2.0, 0.5, false);
        b.stake_strategy = StakeStrategy::Kelly;
        let c = Pick::settled_sample(3, t, 2.0, 1.0, false);
        let picks = [a, b, c];
        let refs: Vec<&Pick> = picks.iter().collect();

        let k = kelly_effectiveness(&refs, 1.0).unwrap();
        assert_eq!(k.picks, 2);
        // realized 4 − 0.5, fixed 2 − 1
        assert!((k.realized_profit - 3.5).abs() < 1e-12);
        assert!((k.fixed_profit - 1.0).abs() < 1e-12);
        assert!((k.uplift_pct.unwrap() - 2.5).abs() < 1e-12);

        assert!(kelly_effectiveness(&refs[2..], 1.0).is_none());
    }

    #[test]
    fn test_stake_advisory() {
        let mut eq = EquityStats::default();
        let cfg = AdvisoryConfig::default();
        assert_eq!(stake_advisory(&eq, &cfg).recommended_stake_factor, 1.0);
        eq.current_drawdown_pct = 0.35;
        let adv = stake_advisory(&eq, &cfg);
        assert!(adv.triggered);
        assert_eq!(adv.recommended_stake_factor, 0.5);
    }
}
