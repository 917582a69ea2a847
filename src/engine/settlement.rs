//! Settlement: resolves open picks against finished fixtures.
//!
//! A pick settles once its fixture is finished with both scores present.
//! Anything short of that (fixture missing from the feed, still live,
//! finished without scores) leaves the pick OPEN for the next run.
//! Settled picks are never looked at again.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::data::InputSnapshot;
use crate::odds::OddsResolver;
use crate::types::{Fixture, Pick, PickResult};

// ---------------------------------------------------------------------------
// Settlement report
// ---------------------------------------------------------------------------

/// Per-run settlement counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub open_before: usize,
    pub settled: usize,
    pub wins: usize,
    pub losses: usize,
    /// Fixture known but not yet finished.
    pub pending: usize,
    /// Fixture finished but scores incomplete.
    pub awaiting_scores: usize,
    pub fixture_missing: usize,
    pub clv_captured: usize,
}

// ---------------------------------------------------------------------------
// Settlement engine
// ---------------------------------------------------------------------------

pub struct SettlementEngine<'a> {
    resolver: OddsResolver<'a>,
    clv_enabled: bool,
}

impl<'a> SettlementEngine<'a> {
    pub fn new(config: &LedgerConfig, inputs: &'a InputSnapshot) -> Self {
        Self {
            resolver: OddsResolver::from_config(&config.odds, inputs),
            clv_enabled: config.settlement.clv_enabled,
        }
    }

    pub fn with_resolver(resolver: OddsResolver<'a>, clv_enabled: bool) -> Self {
        Self {
            resolver,
            clv_enabled,
        }
    }

    /// Settle every open pick whose fixture has a final result.
    pub fn settle(
        &self,
        ledger: &mut [Pick],
        fixtures: &HashMap<u64, Fixture>,
        now: DateTime<Utc>,
    ) -> SettlementReport {
        let mut report = SettlementReport::default();

        for pick in ledger.iter_mut().filter(|p| p.is_open()) {
            report.open_before += 1;

            let Some(fixture) = fixtures.get(&pick.fixture_id) else {
                debug!(fixture_id = pick.fixture_id, "Fixture absent from feed, pick stays open");
                report.fixture_missing += 1;
                continue;
            };
            if !fixture.status.is_finished() {
                report.pending += 1;
                continue;
            }
            let Some(outcome) = fixture.outcome() else {
                warn!(
                    fixture_id = pick.fixture_id,
                    home = ?fixture.home_score,
                    away = ?fixture.away_score,
                    "Finished fixture missing scores, retrying next run"
                );
                report.awaiting_scores += 1;
                continue;
            };

            let won = outcome == pick.side;
            pick.settled = true;
            pick.settled_at = Some(now);
            if won {
                pick.result = Some(PickResult::Win);
                pick.payout = Some(pick.decimal_odds * pick.stake);
                report.wins += 1;
            } else {
                pick.result = Some(PickResult::Loss);
                pick.payout = Some(0.0);
                report.losses += 1;
            }
            report.settled += 1;

            if self.clv_enabled && self.capture_clv(pick) {
                report.clv_captured += 1;
            }

            debug!(
                fixture_id = pick.fixture_id,
                source = %pick.source,
                side = %pick.side,
                outcome = %outcome,
                result = ?pick.result,
                payout = ?pick.payout,
                clv = ?pick.clv_pct,
                "Pick settled"
            );
        }

        info!(
            open = report.open_before,
            settled = report.settled,
            wins = report.wins,
            losses = report.losses,
            awaiting_scores = report.awaiting_scores,
            missing = report.fixture_missing,
            "Settlement complete"
        );
        report
    }

    /// Record closing odds and CLV from the current market price.
    ///
    /// CLV = closing / opening − 1, so a closing price below the opening
    /// price yields a negative value. Fallback prices are not a market
    /// close and produce no CLV.
    fn capture_clv(&self, pick: &mut Pick) -> bool {
        let closing = self.resolver.resolve(pick.fixture_id, pick.side);
        if closing.is_fallback() || pick.decimal_odds <= 0.0 {
            return false;
        }
        pick.closing_decimal_odds = Some(closing.decimal_odds);
        pick.clv_pct = Some(closing.decimal_odds / pick.decimal_odds - 1.0);
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
