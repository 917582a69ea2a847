//! Per-run timeline log and per-day rollup, both derived from the fresh
//! metrics snapshot.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use super::write_json_atomic;
use crate::metrics::MetricsSnapshot;

// ---------------------------------------------------------------------------
// Timeline (append-only NDJSON)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRecord {
    pub ts: DateTime<Utc>,
    pub total_picks: usize,
    pub settled_picks: usize,
    pub open_picks: usize,
    pub profit_units: f64,
    #[serde(rename = "yield")]
    pub yield_rate: f64,
    pub hit_rate: f64,
    pub max_drawdown: f64,
    #[serde(default)]
    pub current_drawdown_pct: f64,
}

impl TimelineRecord {
    pub fn from_metrics(m: &MetricsSnapshot) -> Self {
        Self {
            ts: m.generated_at,
            total_picks: m.totals.total,
            settled_picks: m.totals.settled,
            open_picks: m.totals.open,
            profit_units: m.totals.profit_units,
            yield_rate: m.totals.yield_rate,
            hit_rate: m.totals.hit_rate,
            max_drawdown: m.equity.max_drawdown,
            current_drawdown_pct: m.equity.current_drawdown_pct,
        }
    }
}

/// Append one JSON line to the timeline log.
pub fn append_timeline(path: &Path, record: &TimelineRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(record).context("Failed to serialise timeline record")?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open timeline {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("Failed to append timeline {}", path.display()))?;
    debug!(path = %path.display(), "Timeline record appended");
    Ok(())
}

/// Read back the timeline, skipping malformed lines.
pub fn load_timeline(path: &Path) -> Vec<TimelineRecord> {
    let Ok(contents) = fs::read_to_string(path) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match serde_json::from_str(l) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(error = %e, "Skipping malformed timeline line");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Daily rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub last_ts: DateTime<Utc>,
    pub runs: u32,
    pub total_picks: usize,
    pub settled_picks: usize,
    pub profit_units: f64,
    #[serde(rename = "yield")]
    pub yield_rate: f64,
    pub hit_rate: f64,
}

pub type DailyRollup = BTreeMap<String, DailyAggregate>;

pub fn load_daily(path: &Path) -> DailyRollup {
    let Ok(contents) = fs::read_to_string(path) else {
        return DailyRollup::new();
    };
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Corrupt daily rollup, starting over");
        DailyRollup::new()
    })
}

/// Overwrite today's entry (UTC) with the latest figures and bump its
/// run counter.
pub fn update_daily(path: &Path, m: &MetricsSnapshot) -> Result<DailyAggregate> {
    let mut rollup = load_daily(path);
    let date = m.generated_at.date_naive().format("%Y-%m-%d").to_string();
    let runs = rollup.get(&date).map_or(0, |d| d.runs) + 1;

    let entry = DailyAggregate {
        last_ts: m.generated_at,
        runs,
        total_picks: m.totals.total,
        settled_picks: m.totals.settled,
        profit_units: m.totals.profit_units,
        yield_rate: m.totals.yield_rate,
        hit_rate: m.totals.hit_rate,
    };
    rollup.insert(date, entry.clone());
    write_json_atomic(path, &rollup)?;
    Ok(entry)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
