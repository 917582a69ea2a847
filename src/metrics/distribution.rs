//! Distributional views over settled picks: percentiles, edge deciles,
//! CLV summary and bucketed bands (settlement age, odds).

use serde::Serialize;

use super::aggregate::Aggregate;
use crate::types::Pick;

/// Linear-interpolation percentile of a sorted slice, `p` in [0, 100].
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn sorted(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.into_iter().filter(|x| x.is_finite()).collect();
    v.sort_by(f64::total_cmp);
    v
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Profit distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitDistribution {
    pub picks: usize,
    pub p10: f64,
    pub median: f64,
    pub p90: f64,
    pub mean: f64,
}

/// Per-pick net profit percentiles, `None` below `min_picks`.
pub fn profit_distribution(deltas: &[f64], min_picks: usize) -> Option<ProfitDistribution> {
    if deltas.is_empty() || deltas.len() < min_picks {
        return None;
    }
    let s = sorted(deltas.iter().copied());
    Some(ProfitDistribution {
        picks: s.len(),
        p10: percentile(&s, 10.0)?,
        median: percentile(&s, 50.0)?,
        p90: percentile(&s, 90.0)?,
        mean: mean(&s),
    })
}

// ---------------------------------------------------------------------------
// Edge deciles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeDecile {
    pub decile: usize,
    pub edge_min: f64,
    pub edge_max: f64,
    pub picks: usize,
    pub profit_units: f64,
    #[serde(rename = "yield")]
    pub yield_rate: f64,
    pub hit_rate: f64,
}

/// Ten equal-count buckets by ascending edge. Purely diagnostic.
pub fn edge_deciles(picks: &[&Pick]) -> Vec<EdgeDecile> {
    let n = picks.len();
    if n < 10 {
        return Vec::new();
    }
    let mut by_edge: Vec<&Pick> = picks.to_vec();
    by_edge.sort_by(|a, b| a.edge.total_cmp(&b.edge));

    (0..10)
        .filter_map(|i| {
            let bucket = &by_edge[i * n / 10..(i + 1) * n / 10];
            let first = bucket.first()?;
            let last = bucket.last()?;
            let stats = Aggregate::from_picks(bucket.iter().copied());
            Some(EdgeDecile {
                decile: i + 1,
                edge_min: first.edge,
                edge_max: last.edge,
                picks: bucket.len(),
                profit_units: stats.profit_units,
                yield_rate: stats.yield_rate,
                hit_rate: stats.hit_rate,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CLV
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClvSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Share of picks that beat the close.
    pub positive_share: f64,
}

impl ClvSummary {
    fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let s = sorted(values);
        if s.is_empty() {
            return None;
        }
        let positive = s.iter().filter(|&&v| v > 0.0).count();
        Some(Self {
            count: s.len(),
            mean: mean(&s),
            median: percentile(&s, 50.0)?,
            positive_share: positive as f64 / s.len() as f64,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClvStats {
    pub overall: ClvSummary,
    pub wins: Option<ClvSummary>,
    pub losses: Option<ClvSummary>,
}

pub fn clv_stats(picks: &[&Pick]) -> Option<ClvStats> {
    let with_clv = || picks.iter().filter_map(|p| p.clv_pct.map(|c| (p, c)));
    Some(ClvStats {
        overall: ClvSummary::from_values(with_clv().map(|(_, c)| c))?,
        wins: ClvSummary::from_values(with_clv().filter(|(p, _)| p.is_win()).map(|(_, c)| c)),
        losses: ClvSummary::from_values(with_clv().filter(|(p, _)| p.is_loss()).map(|(_, c)| c)),
    })
}

// ---------------------------------------------------------------------------
// Bands
// ---------------------------------------------------------------------------

/// One bucket `[lower, upper)`; the last bucket is open-ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandBucket {
    pub label: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub picks: usize,
    pub wins: usize,
    pub profit_units: f64,
    #[serde(rename = "yield")]
    pub yield_rate: f64,
}

fn fmt_bound(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

/// Group picks by `value(pick)` against ascending boundaries.
///
/// Values below the first boundary land in a leading `<b0` bucket that is
/// only reported when non-empty. Picks with no value are skipped.
pub fn bands<F>(picks: &[&Pick], bounds: &[f64], value: F) -> Vec<BandBucket>
where
    F: Fn(&Pick) -> Option<f64>,
{
    if bounds.is_empty() {
        return Vec::new();
    }

    let mut ranges: Vec<(Option<f64>, Option<f64>)> = vec![(None, Some(bounds[0]))];
    for (i, &lo) in bounds.iter().enumerate() {
        ranges.push((Some(lo), bounds.get(i + 1).copied()));
    }

    let mut members: Vec<Vec<&Pick>> = vec![Vec::new(); ranges.len()];
    for &pick in picks {
        let Some(v) = value(pick) else { continue };
        let idx = bounds.iter().take_while(|&&b| v >= b).count();
        members[idx].push(pick);
    }

    ranges
        .into_iter()
        .zip(members)
        .enumerate()
        .filter(|(i, (_, m))| *i > 0 || !m.is_empty())
        .map(|(_, ((lower, upper), m))| {
            let label = match (lower, upper) {
                (None, Some(u)) => format!("<{}", fmt_bound(u)),
                (Some(l), Some(u)) => format!("{}-{}", fmt_bound(l), fmt_bound(u)),
                (Some(l), None) => format!("{}+", fmt_bound(l)),
                (None, None) => "all".to_string(),
            };
            let stats = Aggregate::from_picks(m.iter().copied());
            BandBucket {
                label,
                lower,
                upper,
                picks: m.len(),
                wins: stats.wins,
                profit_units: stats.profit_units,
                yield_rate: stats.yield_rate,
            }
        })
        .collect()
}

/// Settled picks by days between creation and settlement.
pub fn aging(picks: &[&Pick], bounds: &[f64]) -> Vec<BandBucket> {
    bands(picks, bounds, Pick::age_at_settlement_days)
}

/// Picks by the decimal odds they were taken at.
pub fn odds_bands(picks: &[&Pick], bounds: &[f64]) -> Vec<BandBucket> {
    bands(picks, bounds, |p| Some(p.decimal_odds))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_percentile_interpolates() {
        let s = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&s, 50.0), Some(3.0));
        assert_eq!(percentile(&s, 0.0), Some(1.0));
        assert_eq!(percentile(&s, 100.0), Some(5.0));
        assert!((percentile(&s, 10.0).unwrap() - 1.4).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_profit_distribution_min_sample() {
        let deltas = vec![1.0, -1.0, 2.0, -1.0];
        assert!(profit_distribution(&deltas, 5).is_none());
        let d = profit_distribution(&deltas, 4).unwrap();
        assert_eq!(d.picks, 4);
        assert!((d.median - 0.0).abs() < 1e-12);
        assert!((d.mean - 0.25).abs() < 1e-12);
        assert!(d.p10 <= d.median && d.median <= d.p90);
    }

    #[test]
    fn test_edge_deciles() {
        let t = Utc::now();
        let picks: Vec<Pick> = (0..25)
            .map(|i| {
                let mut p = Pick::settled_sample(i, t, 2.0, 1.0, i % 2 == 0);
                p.edge = 0.01 * (25 - i) as f64;
                p
            })
            .collect();
        let refs: Vec<&Pick> = picks.iter().collect();
        let deciles = edge_deciles(&refs);
        assert_eq!(deciles.len(), 10);
        assert_eq!(deciles.iter().map(|d| d.picks).sum::<usize>(), 25);
        assert_eq!(deciles[0].decile, 1);
        assert!(deciles[0].edge_max <= deciles[9].edge_min);

        assert!(edge_deciles(&refs[..9]).is_empty());
    }

    #[test]
    fn test_clv_split_by_result() {
        let t = Utc::now();
        let mut a = Pick::settled_sample(1, t, 2.0, 1.0, true);
        a.clv_pct = Some(0.10);
        let mut b = Pick::settled_sample(2, t, 2.0, 1.0, false);
        b.clv_pct = Some(-0.05);
        let mut c = Pick::settled_sample(3, t, 2.0, 1.0, true);
        c.clv_pct = Some(0.02);
        let d = Pick::settled_sample(4, t, 2.0, 1.0, false);
        let picks = [a, b, c, d];
        let refs: Vec<&Pick> = picks.iter().collect();

        let stats = clv_stats(&refs).unwrap();
        assert_eq!(stats.overall.count, 3);
        assert!((stats.overall.median - 0.02).abs() < 1e-12);
        assert!((stats.overall.positive_share - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.wins.as_ref().unwrap().count, 2);
        assert_eq!(stats.losses.as_ref().unwrap().count, 1);

        assert!(clv_stats(&refs[3..]).is_none());
    }

    #[test]
    fn test_aging_buckets() {
        let t = Utc::now() - Duration::days(30);
        let mut fast = Pick::settled_sample(1, t, 2.0, 1.0, true);
        fast.settled_at = Some(t + Duration::hours(3));
        let mut slow = Pick::settled_sample(2, t, 2.0, 1.0, false);
        slow.settled_at = Some(t + Duration::days(20));
        let mut mid = Pick::settled_sample(3, t, 2.0, 1.0, false);
        mid.settled_at = Some(t + Duration::days(4));
        let picks = [fast, slow, mid];
        let refs: Vec<&Pick> = picks.iter().collect();

        let buckets = aging(&refs, &[0.0, 1.0, 3.0, 7.0, 14.0]);
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["0-1", "1-3", "3-7", "7-14", "14+"]);
        assert_eq!(buckets[0].picks, 1);
        assert!((buckets[0].profit_units - 1.0).abs() < 1e-12);
        assert_eq!(buckets[2].picks, 1);
        assert_eq!(buckets[4].picks, 1);
    }

    #[test]
    fn test_odds_bands_leading_bucket() {
        let t = Utc::now();
        let picks = [
            Pick::settled_sample(1, t, 1.3, 1.0, true),
            Pick::settled_sample(2, t, 2.2, 1.0, false),
        ];
        let refs: Vec<&Pick> = picks.iter().collect();
        let buckets = odds_bands(&refs, &[1.5, 2.0, 2.5]);
        assert_eq!(buckets[0].label, "<1.5");
        assert_eq!(buckets[0].picks, 1);
        assert_eq!(buckets[2].label, "2-2.5");
        assert_eq!(buckets[2].picks, 1);
    }
}
