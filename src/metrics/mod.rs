//! Metrics engine.
//!
//! `compute` is a pure function of the ledger and configuration. Every
//! block guards its own minimum sample and degrades to an empty or `None`
//! value, so a fresh ledger still produces a complete snapshot.

pub mod aggregate;
pub mod calibration;
pub mod distribution;
pub mod equity;
pub mod risk;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{parse_bucket_bounds, LedgerConfig};
use crate::types::Pick;

pub use aggregate::{Aggregate, KeyedAggregate, SourceEfficiency};
pub use calibration::CalibrationReport;
pub use distribution::{BandBucket, ClvStats, EdgeDecile, ProfitDistribution};
pub use equity::{EquityStats, RollingWindow, VolatilityWindow};
pub use risk::{AnomalyFlags, KellyEffectiveness, MonteCarloProjection, RiskOfRuin, StakeAdvisory};

/// Full analytics document, regenerated every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub totals: Aggregate,
    pub equity: EquityStats,
    pub by_source: BTreeMap<String, Aggregate>,
    pub by_side: BTreeMap<String, Aggregate>,
    pub by_league: Vec<KeyedAggregate>,
    pub by_odds_band: Vec<BandBucket>,
    pub rolling: Vec<RollingWindow>,
    pub volatility: Vec<VolatilityWindow>,
    pub clv: Option<ClvStats>,
    pub edge_deciles: Vec<EdgeDecile>,
    pub anomalies: Option<AnomalyFlags>,
    pub distribution: Option<ProfitDistribution>,
    pub risk_of_ruin: Option<RiskOfRuin>,
    pub monte_carlo: Option<MonteCarloProjection>,
    pub kelly_effectiveness: Option<KellyEffectiveness>,
    pub aging: Vec<BandBucket>,
    pub source_efficiency: Vec<SourceEfficiency>,
    pub stake_advisory: Option<StakeAdvisory>,
    pub calibration: Option<CalibrationReport>,
}

/// Compute the snapshot, seeding Monte Carlo from config or entropy.
pub fn compute(ledger: &[Pick], cfg: &LedgerConfig, now: DateTime<Utc>) -> MetricsSnapshot {
    let mut rng = match cfg.metrics.monte_carlo.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    compute_with_rng(ledger, cfg, now, &mut rng)
}

pub fn compute_with_rng(
    ledger: &[Pick],
    cfg: &LedgerConfig,
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> MetricsSnapshot {
    let m = &cfg.metrics;
    let blocks = &m.blocks;

    let all: Vec<&Pick> = ledger.iter().collect();
    let settled = equity::chronological(ledger);
    let deltas = equity::profit_deltas(&settled);
    let equity = equity::equity(&settled);

    let (by_source, by_side, by_league, by_odds_band) = if blocks.breakdowns {
        (
            aggregate::group_by(&all, |p| p.source.to_string()),
            aggregate::group_by(&all, |p| p.side.to_string()),
            aggregate::by_league(&all, m.league_top_n),
            distribution::odds_bands(&settled, &parse_bucket_bounds(&m.odds_buckets)),
        )
    } else {
        Default::default()
    };

    let snapshot = MetricsSnapshot {
        generated_at: now,
        totals: Aggregate::from_picks(ledger),
        by_source,
        by_side,
        by_league,
        by_odds_band,
        rolling: if blocks.rolling {
            equity::rolling(&settled, &m.rolling_windows)
        } else {
            Vec::new()
        },
        volatility: if blocks.volatility {
            equity::volatility(&deltas, &m.volatility_windows)
        } else {
            Vec::new()
        },
        clv: blocks.clv.then(|| distribution::clv_stats(&settled)).flatten(),
        edge_deciles: if blocks.edge_deciles {
            distribution::edge_deciles(&settled)
        } else {
            Vec::new()
        },
        anomalies: m
            .anomaly
            .enabled
            .then(|| risk::anomalies(&settled, &deltas, &equity, &m.anomaly)),
        distribution: blocks
            .distribution
            .then(|| distribution::profit_distribution(&deltas, m.min_distribution_picks))
            .flatten(),
        risk_of_ruin: m
            .risk_of_ruin
            .enabled
            .then(|| risk::risk_of_ruin(&settled, &m.risk_of_ruin))
            .flatten(),
        monte_carlo: m
            .monte_carlo
            .enabled
            .then(|| risk::monte_carlo(&deltas, &m.monte_carlo, rng))
            .flatten(),
        kelly_effectiveness: blocks
            .kelly_effectiveness
            .then(|| risk::kelly_effectiveness(&settled, cfg.staking.base_units))
            .flatten(),
        aging: if blocks.aging {
            distribution::aging(&settled, &parse_bucket_bounds(&m.aging_buckets))
        } else {
            Vec::new()
        },
        source_efficiency: if blocks.source_efficiency {
            aggregate::source_efficiency(&settled)
        } else {
            Vec::new()
        },
        stake_advisory: m
            .advisory
            .enabled
            .then(|| risk::stake_advisory(&equity, &m.advisory)),
        calibration: blocks
            .calibration
            .then(|| calibration::calibration(&settled, m.min_calibration_picks))
            .flatten(),
        equity,
    };

    debug!(
        picks = snapshot.totals.total,
        settled = snapshot.totals.settled,
        profit = %format!("{:.2}", snapshot.totals.profit_units),
        "Metrics computed"
    );
    snapshot
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
