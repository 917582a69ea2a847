//! Shared types for the ledger engine.
//!
//! These types form the data model used across all modules: the typed
//! signals and fixtures produced at the input boundary, the persisted
//! `Pick` ledger entry, and the domain error enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Upstream collaborator that produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Prediction,
    Consensus,
    Merged,
}

impl Source {
    /// All known sources (useful for iteration).
    pub const ALL: &'static [Source] = &[Source::Prediction, Source::Consensus, Source::Merged];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Prediction => "prediction",
            Source::Consensus => "consensus",
            Source::Merged => "merged",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prediction" | "predictions" => Ok(Source::Prediction),
            "consensus" => Ok(Source::Consensus),
            "merged" => Ok(Source::Merged),
            _ => Err(LedgerError::UnknownValue {
                kind: "source",
                value: s.to_string(),
            }),
        }
    }
}

/// Match outcome a pick is backing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    HomeWin,
    Draw,
    AwayWin,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::HomeWin => "home_win",
            Side::Draw => "draw",
            Side::AwayWin => "away_win",
        }
    }

    /// Outcome implied by a final score.
    pub fn from_scores(home: u32, away: u32) -> Self {
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => Side::HomeWin,
            std::cmp::Ordering::Less => Side::AwayWin,
            std::cmp::Ordering::Equal => Side::Draw,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "home_win" | "home" | "1" => Ok(Side::HomeWin),
            "draw" | "x" => Ok(Side::Draw),
            "away_win" | "away" | "2" => Ok(Side::AwayWin),
            _ => Err(LedgerError::UnknownValue {
                kind: "side",
                value: s.to_string(),
            }),
        }
    }
}

/// Where the decimal price on a pick came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsSource {
    OddsLatest,
    PredictionsOdds,
    Fallback,
}

impl OddsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OddsSource::OddsLatest => "odds_latest",
            OddsSource::PredictionsOdds => "predictions_odds",
            OddsSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for OddsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staking mode actually applied to a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeStrategy {
    Fixed,
    Kelly,
}

impl fmt::Display for StakeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeStrategy::Fixed => write!(f, "fixed"),
            StakeStrategy::Kelly => write!(f, "kelly"),
        }
    }
}

/// Settled outcome of a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickResult {
    Win,
    Loss,
}

impl fmt::Display for PickResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickResult::Win => write!(f, "win"),
            PickResult::Loss => write!(f, "loss"),
        }
    }
}

/// Fixture lifecycle, parsed from provider status codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureStatus {
    NotStarted,
    Live,
    Finished,
    /// Postponed, cancelled, abandoned and anything unrecognised.
    Other(String),
}

impl FixtureStatus {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "NS" | "TBD" => FixtureStatus::NotStarted,
            "1H" | "HT" | "2H" | "ET" | "BT" | "P" | "LIVE" => FixtureStatus::Live,
            "FT" | "AET" | "PEN" => FixtureStatus::Finished,
            other => match other.to_lowercase().as_str() {
                "not_started" | "scheduled" => FixtureStatus::NotStarted,
                "live" | "in_play" => FixtureStatus::Live,
                "finished" => FixtureStatus::Finished,
                _ => FixtureStatus::Other(other.to_string()),
            },
        }
    }

    pub fn is_pre_match(&self) -> bool {
        matches!(self, FixtureStatus::NotStarted)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, FixtureStatus::Finished)
    }
}

impl fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureStatus::NotStarted => write!(f, "not_started"),
            FixtureStatus::Live => write!(f, "live"),
            FixtureStatus::Finished => write!(f, "finished"),
            FixtureStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validated inputs
// ---------------------------------------------------------------------------

/// A value alert after boundary validation. Transient, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub fixture_id: u64,
    pub source: Source,
    pub side: Side,
    pub edge: f64,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] fixture={} {} edge={:.1}%",
            self.source,
            self.fixture_id,
            self.side,
            self.edge * 100.0,
        )
    }
}

/// Fixture state as reported by the fixtures feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub fixture_id: u64,
    pub status: FixtureStatus,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub league: Option<String>,
}

impl Fixture {
    /// Final outcome, only when the match is finished with both scores.
    pub fn outcome(&self) -> Option<Side> {
        if !self.status.is_finished() {
            return None;
        }
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) => Some(Side::from_scores(h, a)),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn sample(fixture_id: u64, status: &str) -> Self {
        Fixture {
            fixture_id,
            status: FixtureStatus::from_code(status),
            home_score: None,
            away_score: None,
            league: Some("Premier League".to_string()),
        }
    }
}

/// Three-way market values (prices or probabilities).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreeWay {
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
}

// ---------------------------------------------------------------------------
// Pick (ledger entry)
// ---------------------------------------------------------------------------

/// A simulated wager. Created OPEN for a pre-match fixture, settled once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub fixture_id: u64,
    pub source: Source,
    pub side: Side,
    pub edge: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league: Option<String>,

    pub decimal_odds: f64,
    pub odds_source: OddsSource,
    /// 1 / decimal_odds
    pub fair_prob: f64,

    pub stake: f64,
    pub stake_strategy: StakeStrategy,
    #[serde(default)]
    pub kelly_fraction: Option<f64>,
    #[serde(default)]
    pub kelly_fraction_capped: Option<f64>,
    #[serde(default)]
    pub kelly_prob: Option<f64>,
    #[serde(default)]
    pub kelly_b: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_snapshot: Option<ThreeWay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_implied: Option<ThreeWay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_overround: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settled: bool,
    #[serde(default)]
    pub result: Option<PickResult>,
    #[serde(default)]
    pub payout: Option<f64>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closing_decimal_odds: Option<f64>,
    #[serde(default)]
    pub clv_pct: Option<f64>,
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.result {
            Some(r) => r.to_string(),
            None => "open".to_string(),
        };
        write!(
            f,
            "[{}] fixture={} {} @ {:.2} ({}) stake={:.3}u {} [{}]",
            self.source,
            self.fixture_id,
            self.side,
            self.decimal_odds,
            self.odds_source,
            self.stake,
            self.stake_strategy,
            state,
        )
    }
}

impl Pick {
    /// Deduplication key among ledger entries.
    pub fn key(&self) -> (u64, Source) {
        (self.fixture_id, self.source)
    }

    pub fn is_open(&self) -> bool {
        !self.settled
    }

    pub fn is_win(&self) -> bool {
        self.settled && self.result == Some(PickResult::Win)
    }

    pub fn is_loss(&self) -> bool {
        self.settled && self.result == Some(PickResult::Loss)
    }

    /// Net profit in units: payout − stake on a win, −stake on a loss.
    /// `None` while the pick is open.
    pub fn net_profit(&self) -> Option<f64> {
        match (self.settled, self.result) {
            (true, Some(PickResult::Win)) => Some(self.payout.unwrap_or(0.0) - self.stake),
            (true, Some(PickResult::Loss)) => Some(-self.stake),
            _ => None,
        }
    }

    /// Days between creation and settlement.
    pub fn age_at_settlement_days(&self) -> Option<f64> {
        self.settled_at
            .map(|s| (s - self.created_at).num_seconds() as f64 / 86_400.0)
    }

    /// Model probability used for calibration: the staking probability
    /// when one was recorded, else the market-implied one.
    pub fn model_prob(&self) -> f64 {
        self.kelly_prob.unwrap_or(self.fair_prob)
    }

    /// Helper to build a test pick with sensible defaults.
    #[cfg(test)]
    pub fn sample(fixture_id: u64, source: Source, created_at: DateTime<Utc>) -> Self {
        Pick {
            id: Uuid::new_v4(),
            fixture_id,
            source,
            side: Side::HomeWin,
            edge: 0.05,
            league: Some("Premier League".to_string()),
            decimal_odds: 2.0,
            odds_source: OddsSource::OddsLatest,
            fair_prob: 0.5,
            stake: 1.0,
            stake_strategy: StakeStrategy::Fixed,
            kelly_fraction: None,
            kelly_fraction_capped: None,
            kelly_prob: None,
            kelly_b: None,
            market_snapshot: None,
            snapshot_implied: None,
            snapshot_overround: None,
            snapshot_provider: None,
            snapshot_at: None,
            created_at,
            settled: false,
            result: None,
            payout: None,
            settled_at: None,
            closing_decimal_odds: None,
            clv_pct: None,
        }
    }

    /// Test helper: a settled pick at the given odds and stake.
    #[cfg(test)]
    pub fn settled_sample(
        fixture_id: u64,
        created_at: DateTime<Utc>,
        odds: f64,
        stake: f64,
        won: bool,
    ) -> Self {
        let mut p = Pick::sample(fixture_id, Source::Prediction, created_at);
        p.decimal_odds = odds;
        p.fair_prob = 1.0 / odds;
        p.stake = stake;
        p.settled = true;
        p.result = Some(if won { PickResult::Win } else { PickResult::Loss });
        p.payout = Some(if won { odds * stake } else { 0.0 });
        p.settled_at = Some(created_at + chrono::Duration::hours(2));
        p
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the ledger engine.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Invalid {kind} record: {message}")]
    InvalidRecord { kind: &'static str, message: String },

    #[error("Persistence error ({path}): {message}")]
    Persistence { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_from_scores() {
        assert_eq!(Side::from_scores(2, 1), Side::HomeWin);
        assert_eq!(Side::from_scores(0, 3), Side::AwayWin);
        assert_eq!(Side::from_scores(1, 1), Side::Draw);
    }

    #[test]
    fn test_source_roundtrip_strings() {
        for s in Source::ALL {
            assert_eq!(s.as_str().parse::<Source>().unwrap(), *s);
        }
        assert!("tipster".parse::<Source>().is_err());
    }

    #[test]
    fn test_side_serde_snake_case() {
        let json = serde_json::to_string(&Side::AwayWin).unwrap();
        assert_eq!(json, "\"away_win\"");
        let back: Side = serde_json::from_str("\"home_win\"").unwrap();
        assert_eq!(back, Side::HomeWin);
    }

    #[test]
    fn test_fixture_status_codes() {
        assert!(FixtureStatus::from_code("NS").is_pre_match());
        assert!(FixtureStatus::from_code("scheduled").is_pre_match());
        assert!(FixtureStatus::from_code("FT").is_finished());
        assert!(FixtureStatus::from_code("AET").is_finished());
        assert_eq!(FixtureStatus::from_code("2H"), FixtureStatus::Live);
        assert_eq!(
            FixtureStatus::from_code("PST"),
            FixtureStatus::Other("PST".to_string())
        );
    }

    #[test]
    fn test_fixture_outcome_requires_scores() {
        let mut f = Fixture::sample(1, "FT");
        assert_eq!(f.outcome(), None);
        f.home_score = Some(1);
        f.away_score = Some(0);
        assert_eq!(f.outcome(), Some(Side::HomeWin));

        f.status = FixtureStatus::Live;
        assert_eq!(f.outcome(), None);
    }

    #[test]
    fn test_pick_net_profit() {
        let now = Utc::now();
        let open = Pick::sample(1, Source::Prediction, now);
        assert_eq!(open.net_profit(), None);

        let win = Pick::settled_sample(2, now, 2.5, 2.0, true);
        assert!((win.net_profit().unwrap() - 3.0).abs() < 1e-12);

        let loss = Pick::settled_sample(3, now, 2.5, 2.0, false);
        assert_eq!(loss.net_profit(), Some(-2.0));
    }

    #[test]
    fn test_pick_deserialises_without_optional_fields() {
        let json = r#"{
            "fixture_id": 77,
            "source": "consensus",
            "side": "draw",
            "edge": 0.04,
            "decimal_odds": 3.4,
            "odds_source": "fallback",
            "fair_prob": 0.294,
            "stake": 1.0,
            "stake_strategy": "fixed",
            "created_at": "2026-01-01T12:00:00Z"
        }"#;
        let pick: Pick = serde_json::from_str(json).unwrap();
        assert_eq!(pick.key(), (77, Source::Consensus));
        assert!(pick.is_open());
        assert!(pick.market_snapshot.is_none());
    }
}
