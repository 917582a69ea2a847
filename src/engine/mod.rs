//! Core engine: one load → settle → intake → prune → save → metrics cycle.
//!
//! A cycle is a single-threaded batch over local files. Only ledger,
//! archive and metrics writes are fatal; the secondary exports log and
//! carry on.

pub mod settlement;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::data::InputSnapshot;
use crate::metrics::{self, MetricsSnapshot};
use crate::storage::{self, export, timeline, LedgerStore};
use crate::strategy::{IntakeReport, SignalIntake};
use settlement::{SettlementEngine, SettlementReport};

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Summary of a complete cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub settlement: SettlementReport,
    pub intake: IntakeReport,
    pub pruned: usize,
    pub archived: usize,
    pub ledger_size: usize,
    pub open_picks: usize,
    pub profit_units: f64,
    pub anomaly: bool,
    pub recommended_stake_factor: f64,
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

/// Run one full cycle against the configured files.
pub fn run_cycle(config: &LedgerConfig, now: DateTime<Utc>) -> Result<CycleReport> {
    let paths = &config.paths;
    let store = LedgerStore::new(&paths.ledger, &paths.archive);

    let mut ledger = store.load();
    let inputs = InputSnapshot::load(paths);

    // Settle before intake so today's closing prices feed CLV.
    let settlement = SettlementEngine::new(config, &inputs).settle(&mut ledger, &inputs.fixtures, now);

    let (new_picks, intake) =
        SignalIntake::new(config, &inputs).intake(&inputs.signals, &inputs.fixtures, &ledger, now);
    ledger.extend(new_picks);

    let (mut pruned, mut archived) = (0, 0);
    if config.pruning.enabled {
        let outcome = storage::prune(ledger, &config.pruning, now);
        pruned = outcome.archived.len();
        if config.pruning.archive_enabled {
            archived = store
                .append_archive(&outcome.archived)
                .context("Archive write failed, ledger left untouched")?;
        }
        ledger = outcome.kept;
    }

    store.save(&ledger)?;

    let snapshot = metrics::compute(&ledger, config, now);
    storage::write_json_atomic(&paths.metrics, &snapshot)
        .with_context(|| format!("Failed to write metrics {}", paths.metrics.display()))?;
    write_secondary(config, &ledger, &snapshot);

    let report = CycleReport {
        timestamp: now,
        settlement,
        intake,
        pruned,
        archived,
        ledger_size: ledger.len(),
        open_picks: snapshot.totals.open,
        profit_units: snapshot.totals.profit_units,
        anomaly: snapshot.anomalies.as_ref().is_some_and(|a| a.any),
        recommended_stake_factor: snapshot
            .stake_advisory
            .as_ref()
            .map_or(1.0, |a| a.recommended_stake_factor),
    };

    info!(
        settled = report.settlement.settled,
        new_picks = report.intake.accepted,
        pruned = report.pruned,
        ledger = report.ledger_size,
        open = report.open_picks,
        profit = format!("{:.2}u", report.profit_units),
        drawdown = format!("{:.1}%", snapshot.equity.current_drawdown_pct * 100.0),
        "Cycle complete"
    );
    if report.anomaly {
        warn!(
            flags = ?snapshot.anomalies,
            stake_factor = report.recommended_stake_factor,
            "Anomaly flags raised"
        );
    }
    Ok(report)
}

/// Timeline, daily rollup and optional exports. Failures only log.
fn write_secondary(config: &LedgerConfig, ledger: &[crate::types::Pick], snapshot: &MetricsSnapshot) {
    let paths = &config.paths;

    if config.export.compact_enabled {
        if let Err(e) = export::write_compact(&paths.metrics_compact, snapshot) {
            warn!(error = %e, "Compact metrics export failed");
        }
    }
    if config.export.csv_enabled {
        if let Err(e) = export::write_ledger_csv(&paths.ledger_csv, ledger) {
            warn!(error = %e, "Ledger CSV export failed");
        }
    }
    if let Err(e) = timeline::append_timeline(&paths.timeline, &timeline::TimelineRecord::from_metrics(snapshot)) {
        warn!(error = %e, "Timeline append failed");
    }
    if let Err(e) = timeline::update_daily(&paths.daily, snapshot) {
        warn!(error = %e, "Daily rollup update failed");
    }
}
