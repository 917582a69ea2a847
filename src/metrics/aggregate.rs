//! Core aggregates and the breakdowns built from them.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{Pick, Source};

/// Counts, profit, yield and hit rate over a set of picks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregate {
    pub total: usize,
    pub settled: usize,
    pub open: usize,
    pub wins: usize,
    pub losses: usize,
    pub profit_units: f64,
    /// Stake over settled picks.
    pub stake_sum: f64,
    #[serde(rename = "yield")]
    pub yield_rate: f64,
    pub hit_rate: f64,
}

impl Aggregate {
    pub fn from_picks<'a>(picks: impl IntoIterator<Item = &'a Pick>) -> Self {
        let mut agg = Aggregate::default();
        for pick in picks {
            agg.total += 1;
            let Some(profit) = pick.net_profit() else {
                agg.open += 1;
                continue;
            };
            agg.settled += 1;
            agg.profit_units += profit;
            agg.stake_sum += pick.stake;
            if pick.is_win() {
                agg.wins += 1;
            } else {
                agg.losses += 1;
            }
        }
        if agg.stake_sum > 0.0 {
            agg.yield_rate = agg.profit_units / agg.stake_sum;
        }
        let resolved = agg.wins + agg.losses;
        if resolved > 0 {
            agg.hit_rate = agg.wins as f64 / resolved as f64;
        }
        agg
    }
}

/// An aggregate tagged with its grouping key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyedAggregate {
    pub key: String,
    #[serde(flatten)]
    pub stats: Aggregate,
}

/// Group picks by a string key and aggregate each group.
pub fn group_by<'a, F>(picks: &[&'a Pick], key: F) -> BTreeMap<String, Aggregate>
where
    F: Fn(&Pick) -> String,
{
    let mut groups: BTreeMap<String, Vec<&'a Pick>> = BTreeMap::new();
    for &pick in picks {
        groups.entry(key(pick)).or_default().push(pick);
    }
    groups
        .into_iter()
        .map(|(k, members)| (k, Aggregate::from_picks(members)))
        .collect()
}

/// Top-N leagues by settled volume; picks without a league group as "unknown".
pub fn by_league(picks: &[&Pick], top_n: usize) -> Vec<KeyedAggregate> {
    let mut leagues: Vec<KeyedAggregate> = group_by(picks, |p| {
        p.league.clone().unwrap_or_else(|| "unknown".to_string())
    })
    .into_iter()
    .map(|(key, stats)| KeyedAggregate { key, stats })
    .collect();
    // Stable sort keeps alphabetical order for ties.
    leagues.sort_by(|a, b| b.stats.settled.cmp(&a.stats.settled));
    leagues.truncate(top_n);
    leagues
}

/// Per-source ranking entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceEfficiency {
    pub rank: usize,
    pub source: Source,
    pub settled: usize,
    pub profit_units: f64,
    #[serde(rename = "yield")]
    pub yield_rate: f64,
    pub hit_rate: f64,
}

/// Rank sources with settled picks by yield, then hit rate.
pub fn source_efficiency(picks: &[&Pick]) -> Vec<SourceEfficiency> {
    let mut ranked: Vec<SourceEfficiency> = Source::ALL
        .iter()
        .filter_map(|&source| {
            let stats = Aggregate::from_picks(picks.iter().copied().filter(|p| p.source == source));
            (stats.settled > 0).then(|| SourceEfficiency {
                rank: 0,
                source,
                settled: stats.settled,
                profit_units: stats.profit_units,
                yield_rate: stats.yield_rate,
                hit_rate: stats.hit_rate,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.yield_rate
            .total_cmp(&a.yield_rate)
            .then(b.hit_rate.total_cmp(&a.hit_rate))
    });
    for (i, entry) in ranked.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    ranked
}
