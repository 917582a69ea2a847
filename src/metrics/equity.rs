//! Equity curve, drawdown, rolling windows and volatility.
//!
//! All of these walk settled picks in creation order (ties broken by
//! fixture id), accumulating per-pick net profit from a zero start.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::aggregate::Aggregate;
use crate::types::Pick;

/// Settled picks in chronological order.
pub fn chronological(ledger: &[Pick]) -> Vec<&Pick> {
    let mut settled: Vec<&Pick> = ledger.iter().filter(|p| p.settled).collect();
    settled.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then(a.fixture_id.cmp(&b.fixture_id))
    });
    settled
}

/// Per-pick net profit deltas, in the given order.
pub fn profit_deltas(picks: &[&Pick]) -> Vec<f64> {
    picks.iter().filter_map(|p| p.net_profit()).collect()
}

// ---------------------------------------------------------------------------
// Equity & drawdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EquityStats {
    pub equity_points: usize,
    pub profit_units: f64,
    pub peak_profit: f64,
    /// Largest peak-to-trough decline.
    pub max_drawdown: f64,
    /// max_drawdown / peak_profit
    pub max_drawdown_pct: f64,
    pub current_drawdown: f64,
    pub current_drawdown_pct: f64,
    pub longest_win_streak: usize,
    pub longest_loss_streak: usize,
    /// Positive for a running win streak, negative for losses.
    pub current_streak: i64,
}

pub fn equity(picks: &[&Pick]) -> EquityStats {
    let mut stats = EquityStats::default();
    let mut running = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut streak: i64 = 0;

    for pick in picks {
        let Some(delta) = pick.net_profit() else {
            continue;
        };
        stats.equity_points += 1;
        running += delta;
        if running > peak {
            peak = running;
        }
        stats.max_drawdown = stats.max_drawdown.max(peak - running);

        streak = match (pick.is_win(), streak) {
            (true, s) if s > 0 => s + 1,
            (true, _) => 1,
            (false, s) if s < 0 => s - 1,
            (false, _) => -1,
        };
        if streak > 0 {
            stats.longest_win_streak = stats.longest_win_streak.max(streak as usize);
        } else {
            stats.longest_loss_streak = stats.longest_loss_streak.max(streak.unsigned_abs() as usize);
        }
    }

    stats.profit_units = running;
    stats.peak_profit = peak;
    stats.current_drawdown = peak - running;
    stats.current_streak = streak;
    if peak > 0.0 {
        stats.max_drawdown_pct = stats.max_drawdown / peak;
        stats.current_drawdown_pct = stats.current_drawdown / peak;
    }
    stats
}

// ---------------------------------------------------------------------------
// Rolling windows
// ---------------------------------------------------------------------------

/// Aggregate over the most recent settled picks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingWindow {
    pub window: usize,
    pub picks_rolling: usize,
    /// Whether enough settled picks existed to fill the window.
    pub complete: bool,
    pub since: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub stats: Aggregate,
}

/// The last `window` entries of a chronological slice.
pub fn tail<'a, T>(items: &'a [T], window: usize) -> &'a [T] {
    &items[items.len().saturating_sub(window)..]
}

pub fn rolling(picks: &[&Pick], windows: &[usize]) -> Vec<RollingWindow> {
    if picks.is_empty() {
        return Vec::new();
    }
    windows
        .iter()
        .map(|&window| {
            let recent = tail(picks, window);
            RollingWindow {
                window,
                picks_rolling: recent.len(),
                complete: recent.len() >= window,
                since: recent.first().map(|p| p.created_at),
                stats: Aggregate::from_picks(recent.iter().copied()),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Volatility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityWindow {
    pub window: usize,
    pub picks: usize,
    pub stdev: f64,
}

/// Population standard deviation; `None` below two samples.
pub fn stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(var.sqrt())
}

/// Standard deviation of the last `window` profit deltas.
pub fn window_volatility(deltas: &[f64], window: usize) -> Option<f64> {
    stdev(tail(deltas, window))
}

pub fn volatility(deltas: &[f64], windows: &[usize]) -> Vec<VolatilityWindow> {
    windows
        .iter()
        .filter_map(|&window| {
            let recent = tail(deltas, window);
            stdev(recent).map(|sd| VolatilityWindow {
                window,
                picks: recent.len(),
                stdev: sd,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
