//! Optional exports: flat CSV of the ledger and a compact metrics subset
//! for lightweight consumers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

use super::{write_atomic, write_json_atomic};
use crate::metrics::MetricsSnapshot;
use crate::types::Pick;

// ---------------------------------------------------------------------------
// Ledger CSV
// ---------------------------------------------------------------------------

/// One flat CSV row per pick.
#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    id: String,
    fixture_id: u64,
    source: &'a str,
    side: &'a str,
    league: &'a str,
    edge: f64,
    decimal_odds: f64,
    odds_source: &'a str,
    stake: f64,
    stake_strategy: String,
    created_at: String,
    settled: bool,
    result: String,
    payout: Option<f64>,
    net_profit: Option<f64>,
    settled_at: String,
    closing_decimal_odds: Option<f64>,
    clv_pct: Option<f64>,
}

impl<'a> From<&'a Pick> for LedgerRow<'a> {
    fn from(p: &'a Pick) -> Self {
        Self {
            id: p.id.to_string(),
            fixture_id: p.fixture_id,
            source: p.source.as_str(),
            side: p.side.as_str(),
            league: p.league.as_deref().unwrap_or(""),
            edge: p.edge,
            decimal_odds: p.decimal_odds,
            odds_source: p.odds_source.as_str(),
            stake: p.stake,
            stake_strategy: p.stake_strategy.to_string(),
            created_at: p.created_at.to_rfc3339(),
            settled: p.settled,
            result: p.result.map(|r| r.to_string()).unwrap_or_default(),
            payout: p.payout,
            net_profit: p.net_profit(),
            settled_at: p.settled_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            closing_decimal_odds: p.closing_decimal_odds,
            clv_pct: p.clv_pct,
        }
    }
}

pub fn ledger_csv(ledger: &[Pick]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for pick in ledger {
        writer.serialize(LedgerRow::from(pick))?;
    }
    writer.into_inner().context("Failed to finish CSV buffer")
}

/// Overwrite the CSV export with the current ledger.
pub fn write_ledger_csv(path: &Path, ledger: &[Pick]) -> Result<()> {
    let bytes = ledger_csv(ledger)?;
    write_atomic(path, &bytes)?;
    debug!(path = %path.display(), rows = ledger.len(), "Ledger CSV written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Compact metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactMetrics {
    pub generated_at: DateTime<Utc>,
    pub total_picks: usize,
    pub settled_picks: usize,
    pub open_picks: usize,
    pub profit_units: f64,
    #[serde(rename = "yield")]
    pub yield_rate: f64,
    pub hit_rate: f64,
    pub max_drawdown: f64,
    pub current_drawdown_pct: f64,
    pub anomaly_any: bool,
    pub recommended_stake_factor: f64,
}

impl From<&MetricsSnapshot> for CompactMetrics {
    fn from(m: &MetricsSnapshot) -> Self {
        Self {
            generated_at: m.generated_at,
            total_picks: m.totals.total,
            settled_picks: m.totals.settled,
            open_picks: m.totals.open,
            profit_units: m.totals.profit_units,
            yield_rate: m.totals.yield_rate,
            hit_rate: m.totals.hit_rate,
            max_drawdown: m.equity.max_drawdown,
            current_drawdown_pct: m.equity.current_drawdown_pct,
            anomaly_any: m.anomalies.as_ref().is_some_and(|a| a.any),
            recommended_stake_factor: m
                .stake_advisory
                .as_ref()
                .map_or(1.0, |a| a.recommended_stake_factor),
        }
    }
}

pub fn write_compact(path: &Path, metrics: &MetricsSnapshot) -> Result<()> {
    write_json_atomic(path, &CompactMetrics::from(metrics))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::types::Source;

    #[test]
    fn test_ledger_csv_has_header_and_rows() {
        let t = Utc::now();
        let ledger = vec![
            Pick::settled_sample(7, t, 2.5, 1.0, true),
            Pick::sample(8, Source::Consensus, t),
        ];
        let bytes = ledger_csv(&ledger).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,fixture_id,source,side"));
        assert!(lines[1].contains(",7,prediction,home_win,"));
        assert!(lines[1].contains(",win,"));
        assert!(lines[2].contains(",8,consensus,"));
    }

    #[test]
    fn test_compact_metrics_subset() {
        let ledger = vec![Pick::settled_sample(1, Utc::now(), 2.0, 1.0, true)];
        let snap = crate::metrics::compute(&ledger, &LedgerConfig::default(), Utc::now());
        let compact = CompactMetrics::from(&snap);
        assert_eq!(compact.total_picks, 1);
        assert!((compact.profit_units - 1.0).abs() < 1e-12);
        assert!(!compact.anomaly_any);
        assert_eq!(compact.recommended_stake_factor, 1.0);

        let value = serde_json::to_value(&compact).unwrap();
        assert!(value.get("yield").is_some());
    }
}
