//! Signal intake: filtering, deduplication, daily cap, pricing and sizing.

pub mod kelly;
pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{CapPriority, LedgerConfig};
use crate::data::InputSnapshot;
use crate::odds::OddsResolver;
use crate::types::{Fixture, Pick, Signal, Source};
use kelly::StakingPolicy;
use snapshot::OddsSnapshot;

// ---------------------------------------------------------------------------
// Intake report
// ---------------------------------------------------------------------------

/// Why an alert did not become a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    SourceNotAccepted,
    EdgeBelowMinimum,
    FixtureMissing,
    NotPreMatch,
    Duplicate,
    DailyCap,
}

/// Per-run intake counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntakeReport {
    pub considered: usize,
    pub accepted: usize,
    pub rejected_source: usize,
    pub rejected_min_edge: usize,
    pub rejected_fixture_missing: usize,
    pub rejected_not_pre_match: usize,
    pub rejected_duplicate: usize,
    pub dropped_daily_cap: usize,
}

impl IntakeReport {
    fn record(&mut self, reason: RejectionReason) {
        match reason {
            RejectionReason::SourceNotAccepted => self.rejected_source += 1,
            RejectionReason::EdgeBelowMinimum => self.rejected_min_edge += 1,
            RejectionReason::FixtureMissing => self.rejected_fixture_missing += 1,
            RejectionReason::NotPreMatch => self.rejected_not_pre_match += 1,
            RejectionReason::Duplicate => self.rejected_duplicate += 1,
            RejectionReason::DailyCap => self.dropped_daily_cap += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Signal intake
// ---------------------------------------------------------------------------

/// Turns validated alerts into new OPEN picks.
///
/// Instantiate once per run with the run's inputs; call `intake` with the
/// current ledger so re-seen (fixture, source) pairs are ignored.
pub struct SignalIntake<'a> {
    config: &'a LedgerConfig,
    inputs: &'a InputSnapshot,
    resolver: OddsResolver<'a>,
    staking: StakingPolicy,
}

impl<'a> SignalIntake<'a> {
    pub fn new(config: &'a LedgerConfig, inputs: &'a InputSnapshot) -> Self {
        Self {
            config,
            inputs,
            resolver: OddsResolver::from_config(&config.odds, inputs),
            staking: StakingPolicy::new(config.staking.clone()),
        }
    }

    fn screen(
        &self,
        signal: &Signal,
        fixtures: &HashMap<u64, Fixture>,
        seen: &HashSet<(u64, Source)>,
    ) -> Result<(), RejectionReason> {
        let cfg = &self.config.intake;
        if !cfg.accepted_sources.contains(&signal.source) {
            return Err(RejectionReason::SourceNotAccepted);
        }
        if signal.edge < cfg.min_edge {
            return Err(RejectionReason::EdgeBelowMinimum);
        }
        let fixture = fixtures
            .get(&signal.fixture_id)
            .ok_or(RejectionReason::FixtureMissing)?;
        if !fixture.status.is_pre_match() {
            return Err(RejectionReason::NotPreMatch);
        }
        if seen.contains(&(signal.fixture_id, signal.source)) {
            return Err(RejectionReason::Duplicate);
        }
        Ok(())
    }

    /// Screen, cap, price and size the alerts.
    ///
    /// Returns only the new picks; the caller appends them to the ledger.
    pub fn intake(
        &self,
        signals: &[Signal],
        fixtures: &HashMap<u64, Fixture>,
        existing: &[Pick],
        now: DateTime<Utc>,
    ) -> (Vec<Pick>, IntakeReport) {
        let mut report = IntakeReport {
            considered: signals.len(),
            ..Default::default()
        };
        let mut seen: HashSet<(u64, Source)> = existing.iter().map(Pick::key).collect();

        // Step 1 – screening, in arrival order
        let mut candidates: Vec<(usize, &Signal)> = Vec::new();
        for (idx, signal) in signals.iter().enumerate() {
            match self.screen(signal, fixtures, &seen) {
                Ok(()) => {
                    seen.insert((signal.fixture_id, signal.source));
                    candidates.push((idx, signal));
                }
                Err(reason) => {
                    debug!(%signal, ?reason, "Alert rejected");
                    report.record(reason);
                }
            }
        }

        // Step 2 – daily cap
        if let Some(cap) = self.config.intake.daily_cap {
            let today = now.date_naive();
            let created_today = existing
                .iter()
                .filter(|p| p.created_at.date_naive() == today)
                .count();
            let room = cap.saturating_sub(created_today);
            if candidates.len() > room {
                if self.config.intake.cap_priority == CapPriority::Edge {
                    candidates.sort_by(|a, b| b.1.edge.total_cmp(&a.1.edge));
                }
                for (_, dropped) in candidates.drain(room..) {
                    debug!(signal = %dropped, cap, "Alert dropped by daily cap");
                    report.record(RejectionReason::DailyCap);
                }
                candidates.sort_by_key(|(idx, _)| *idx);
            }
        }

        // Step 3 – price, size, snapshot
        let picks: Vec<Pick> = candidates
            .into_iter()
            .map(|(_, signal)| self.open_pick(signal, fixtures.get(&signal.fixture_id), now))
            .collect();
        report.accepted = picks.len();

        info!(
            considered = report.considered,
            accepted = report.accepted,
            duplicates = report.rejected_duplicate,
            capped = report.dropped_daily_cap,
            "Signal intake complete"
        );
        (picks, report)
    }

    fn open_pick(&self, signal: &Signal, fixture: Option<&Fixture>, now: DateTime<Utc>) -> Pick {
        let odds = self.resolver.resolve(signal.fixture_id, signal.side);
        let stake = self
            .staking
            .stake(odds.decimal_odds, self.inputs.model_prob(signal));

        let mut pick = Pick {
            id: Uuid::new_v4(),
            fixture_id: signal.fixture_id,
            source: signal.source,
            side: signal.side,
            edge: signal.edge,
            league: fixture.and_then(|f| f.league.clone()),
            decimal_odds: odds.decimal_odds,
            odds_source: odds.source,
            fair_prob: 1.0 / odds.decimal_odds,
            stake: stake.stake,
            stake_strategy: stake.strategy,
            kelly_fraction: stake.kelly_fraction,
            kelly_fraction_capped: stake.kelly_fraction_capped,
            kelly_prob: stake.kelly_prob,
            kelly_b: stake.kelly_b,
            market_snapshot: None,
            snapshot_implied: None,
            snapshot_overround: None,
            snapshot_provider: None,
            snapshot_at: None,
            created_at: now,
            settled: false,
            result: None,
            payout: None,
            settled_at: None,
            closing_decimal_odds: None,
            clv_pct: None,
        };

        if self.config.snapshot.enabled {
            if let Some(snap) = self
                .inputs
                .odds_latest
                .get(&signal.fixture_id)
                .and_then(|entry| OddsSnapshot::capture(entry, now))
            {
                snap.apply_to(&mut pick);
            }
        }

        info!(
            fixture_id = pick.fixture_id,
            source = %pick.source,
            side = %pick.side,
            odds = format!("{:.2}", pick.decimal_odds),
            odds_source = %pick.odds_source,
            stake = format!("{:.3}u", pick.stake),
            strategy = %pick.stake_strategy,
            "Pick opened"
        );
        pick
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
