//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section falls back to its `Default`, so a partial file is valid. The
//! resulting `LedgerConfig` is validated once at start-up and then passed
//! by reference into every component.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::types::{LedgerError, OddsSource, Source};

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LedgerConfig {
    pub paths: PathsConfig,
    pub intake: IntakeConfig,
    pub staking: StakingConfig,
    pub odds: OddsConfig,
    pub settlement: SettlementConfig,
    pub snapshot: SnapshotConfig,
    pub pruning: PruningConfig,
    pub export: ExportConfig,
    pub metrics: MetricsConfig,
    pub schedule: ScheduleConfig,
}

/// Input and output file locations.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub alerts: PathBuf,
    pub fixtures: PathBuf,
    pub predictions: PathBuf,
    pub consensus: PathBuf,
    pub odds_latest: PathBuf,
    pub ledger: PathBuf,
    pub archive: PathBuf,
    pub metrics: PathBuf,
    pub metrics_compact: PathBuf,
    pub timeline: PathBuf,
    pub daily: PathBuf,
    pub ledger_csv: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::under(Path::new("data"))
    }
}

impl PathsConfig {
    /// All files inside a single directory, using the default file names.
    pub fn under(dir: &Path) -> Self {
        Self {
            alerts: dir.join("alerts.json"),
            fixtures: dir.join("fixtures.json"),
            predictions: dir.join("predictions.json"),
            consensus: dir.join("consensus.json"),
            odds_latest: dir.join("odds_latest.json"),
            ledger: dir.join("ledger.json"),
            archive: dir.join("ledger_archive.json"),
            metrics: dir.join("metrics.json"),
            metrics_compact: dir.join("metrics_compact.json"),
            timeline: dir.join("timeline.jsonl"),
            daily: dir.join("daily.json"),
            ledger_csv: dir.join("ledger.csv"),
        }
    }
}

/// Which candidates survive when the daily cap is hit.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapPriority {
    /// Keep alerts in the order they arrived.
    #[default]
    Arrival,
    /// Keep the highest-edge alerts first.
    Edge,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IntakeConfig {
    pub accepted_sources: Vec<Source>,
    pub min_edge: f64,
    /// Maximum new picks per UTC calendar day. `None` = unlimited.
    pub daily_cap: Option<usize>,
    pub cap_priority: CapPriority,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            accepted_sources: Source::ALL.to_vec(),
            min_edge: 0.03,
            daily_cap: Some(25),
            cap_priority: CapPriority::Arrival,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StakingConfig {
    /// Use fractional Kelly sizing. Falls back to fixed per pick when
    /// Kelly inputs are unusable.
    pub kelly_enabled: bool,
    pub base_units: f64,
    pub max_units: f64,
    pub fraction_cap: f64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            kelly_enabled: false,
            base_units: 1.0,
            max_units: 3.0,
            fraction_cap: 0.25,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OddsConfig {
    /// Provider lookup order.
    pub providers: Vec<OddsSource>,
    /// Prices at or below this are ignored.
    pub min_price: f64,
    pub fallback_odds: f64,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            providers: vec![OddsSource::OddsLatest, OddsSource::PredictionsOdds],
            min_price: 1.01,
            fallback_odds: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SettlementConfig {
    pub clv_enabled: bool,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { clv_enabled: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Upper bound on `pruning.max_age_days` (about a century).
pub const MAX_PRUNE_AGE_DAYS: i64 = 36_500;

/// Smallest settled sample the risk-of-ruin estimate accepts.
pub const MIN_RISK_OF_RUIN_PICKS: usize = 30;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PruningConfig {
    pub enabled: bool,
    pub max_count: usize,
    pub max_age_days: i64,
    pub archive_enabled: bool,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_count: 5000,
            max_age_days: 180,
            archive_enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub csv_enabled: bool,
    pub compact_enabled: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            csv_enabled: false,
            compact_enabled: true,
        }
    }
}

/// Per-block enable flags for the metrics engine.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetricBlocks {
    pub breakdowns: bool,
    pub rolling: bool,
    pub volatility: bool,
    pub clv: bool,
    pub edge_deciles: bool,
    pub distribution: bool,
    pub kelly_effectiveness: bool,
    pub aging: bool,
    pub source_efficiency: bool,
    pub calibration: bool,
}

impl Default for MetricBlocks {
    fn default() -> Self {
        Self {
            breakdowns: true,
            rolling: true,
            volatility: true,
            clv: true,
            edge_deciles: true,
            distribution: true,
            kelly_effectiveness: true,
            aging: true,
            source_efficiency: true,
            calibration: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnomalyConfig {
    pub enabled: bool,
    /// Flag when current drawdown exceeds this fraction of peak profit.
    pub drawdown_pct_threshold: f64,
    /// Flag when rolling yield is this fraction below all-time yield.
    pub yield_drop_fraction: f64,
    pub yield_window: usize,
    /// Flag when recent volatility exceeds baseline by this multiple.
    pub volatility_multiple: f64,
    pub volatility_window: usize,
    pub volatility_baseline_window: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            drawdown_pct_threshold: 0.30,
            yield_drop_fraction: 0.5,
            yield_window: 50,
            volatility_multiple: 1.5,
            volatility_window: 20,
            volatility_baseline_window: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub enabled: bool,
    pub runs: usize,
    pub window: usize,
    /// Percentiles in 0–100.
    pub percentiles: Vec<f64>,
    /// Fixed seed for reproducible projections.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            runs: 1000,
            window: 200,
            percentiles: vec![5.0, 50.0, 95.0],
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RiskOfRuinConfig {
    pub enabled: bool,
    pub bankroll_units: f64,
    pub min_picks: usize,
}

impl Default for RiskOfRuinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bankroll_units: 50.0,
            min_picks: MIN_RISK_OF_RUIN_PICKS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdvisoryConfig {
    pub enabled: bool,
    pub drawdown_pct_threshold: f64,
    /// Recommended multiplier on next-cycle stakes while triggered.
    pub stake_factor: f64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            drawdown_pct_threshold: 0.20,
            stake_factor: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub blocks: MetricBlocks,
    pub rolling_windows: Vec<usize>,
    pub volatility_windows: Vec<usize>,
    pub league_top_n: usize,
    pub min_distribution_picks: usize,
    pub min_calibration_picks: usize,
    /// Settlement-age bucket boundaries in days, e.g. `"0,1,3,7,14"`.
    pub aging_buckets: String,
    /// Decimal-odds band boundaries, e.g. `"1.5,2.0,3.0"`.
    pub odds_buckets: String,
    pub anomaly: AnomalyConfig,
    pub monte_carlo: MonteCarloConfig,
    pub risk_of_ruin: RiskOfRuinConfig,
    pub advisory: AdvisoryConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            blocks: MetricBlocks::default(),
            rolling_windows: vec![20, 50, 100],
            volatility_windows: vec![20, 50],
            league_top_n: 10,
            min_distribution_picks: 5,
            min_calibration_picks: 20,
            aging_buckets: "0,1,3,7,14".to_string(),
            odds_buckets: "1.5,2.0,2.5,3.5,5.0".to_string(),
            anomaly: AnomalyConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
            risk_of_ruin: RiskOfRuinConfig::default(),
            advisory: AdvisoryConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between runs in `--watch` mode.
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: 900 }
    }
}

impl LedgerConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: LedgerConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no component can run with.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let s = &self.staking;
        if !(s.base_units.is_finite() && s.base_units > 0.0) {
            return Err(invalid("staking.base_units must be > 0"));
        }
        if !(s.max_units.is_finite() && s.max_units > 0.0) {
            return Err(invalid("staking.max_units must be > 0"));
        }
        if !(s.fraction_cap > 0.0 && s.fraction_cap <= 1.0) {
            return Err(invalid("staking.fraction_cap must be in (0, 1]"));
        }

        if !self.intake.min_edge.is_finite() {
            return Err(invalid("intake.min_edge must be finite"));
        }
        if self.intake.accepted_sources.is_empty() {
            return Err(invalid("intake.accepted_sources must not be empty"));
        }

        let o = &self.odds;
        if o.providers.is_empty() {
            return Err(invalid("odds.providers must not be empty"));
        }
        if o.providers.contains(&OddsSource::Fallback) {
            return Err(invalid("odds.providers must not list 'fallback'"));
        }
        if !(o.min_price >= 1.0) {
            return Err(invalid("odds.min_price must be >= 1.0"));
        }
        if !(o.fallback_odds > 1.0) {
            return Err(invalid("odds.fallback_odds must be > 1.0"));
        }

        let p = &self.pruning;
        if p.max_count == 0 || p.max_age_days <= 0 {
            return Err(invalid("pruning.max_count and pruning.max_age_days must be > 0"));
        }
        if p.max_age_days > MAX_PRUNE_AGE_DAYS {
            return Err(invalid("pruning.max_age_days must be <= 36500"));
        }

        let m = &self.metrics;
        if m.rolling_windows.is_empty() || m.rolling_windows.contains(&0) {
            return Err(invalid("metrics.rolling_windows must be non-empty and > 0"));
        }
        if m.volatility_windows.contains(&0) {
            return Err(invalid("metrics.volatility_windows must be > 0"));
        }
        let mc = &m.monte_carlo;
        if mc.enabled && (mc.runs == 0 || mc.window == 0) {
            return Err(invalid("metrics.monte_carlo runs and window must be > 0"));
        }
        if mc.percentiles.iter().any(|p| !(0.0..=100.0).contains(p)) {
            return Err(invalid("metrics.monte_carlo.percentiles must be within 0..=100"));
        }
        if !(m.risk_of_ruin.bankroll_units > 0.0) {
            return Err(invalid("metrics.risk_of_ruin.bankroll_units must be > 0"));
        }
        if m.risk_of_ruin.min_picks < MIN_RISK_OF_RUIN_PICKS {
            return Err(invalid("metrics.risk_of_ruin.min_picks must be >= 30"));
        }
        if !(m.advisory.stake_factor > 0.0 && m.advisory.stake_factor <= 1.0) {
            return Err(invalid("metrics.advisory.stake_factor must be in (0, 1]"));
        }
        if self.schedule.interval_secs == 0 {
            return Err(invalid("schedule.interval_secs must be > 0"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> LedgerError {
    LedgerError::Config(msg.to_string())
}

/// Parse a bucket boundary specification into a sorted, deduplicated list.
///
/// Accepts plain numbers (`"0,1,3,7"`), range tokens (`"0-1,1-3"`) and an
/// open-ended tail (`"14+"`). Unparseable tokens are skipped.
pub fn parse_bucket_bounds(spec: &str) -> Vec<f64> {
    let mut bounds = Vec::new();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let token = token.trim_end_matches('+');
        let parts: Vec<&str> = match token.split_once('-') {
            Some((lo, hi)) if !lo.is_empty() => vec![lo, hi],
            _ => vec![token],
        };
        for part in parts {
            match part.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => bounds.push(v),
                _ => warn!(token = part, spec, "Skipping invalid bucket boundary"),
            }
        }
    }
    bounds.sort_by(|a, b| a.total_cmp(b));
    bounds.dedup();
    bounds
}
