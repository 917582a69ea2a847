//! Input boundary.
//!
//! Loads the JSON artifacts produced by upstream collaborators (alerts,
//! fixtures, predictions, consensus blends, latest odds) and validates them
//! into typed values. Nothing here is fatal: a missing file contributes no
//! data, malformed JSON is logged and treated as empty, and individual
//! records with bad fields are skipped.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::PathsConfig;
use crate::types::{Fixture, FixtureStatus, LedgerError, Side, Signal, Source};

// ---------------------------------------------------------------------------
// Typed index entries
// ---------------------------------------------------------------------------

/// Per-outcome values where any outcome may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct OutcomeValues {
    #[serde(default)]
    pub home_win: Option<f64>,
    #[serde(default)]
    pub draw: Option<f64>,
    #[serde(default)]
    pub away_win: Option<f64>,
}

impl OutcomeValues {
    pub fn get(&self, side: Side) -> Option<f64> {
        match side {
            Side::HomeWin => self.home_win,
            Side::Draw => self.draw,
            Side::AwayWin => self.away_win,
        }
    }

    /// Drop values that fail `keep`.
    fn retain(self, keep: impl Fn(f64) -> bool) -> Self {
        let check = |v: Option<f64>| v.filter(|x| x.is_finite() && keep(*x));
        Self {
            home_win: check(self.home_win),
            draw: check(self.draw),
            away_win: check(self.away_win),
        }
    }

    fn as_prices(self) -> Self {
        self.retain(|p| p > 1.0)
    }

    fn as_probabilities(self) -> Self {
        self.retain(|p| p > 0.0 && p < 1.0)
    }
}

/// Model output for one fixture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionEntry {
    pub prob: OutcomeValues,
    /// Prices the model saw when it produced the prediction.
    pub odds_original: OutcomeValues,
}

/// Consensus blend for one fixture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsensusEntry {
    pub blended_prob: OutcomeValues,
}

/// Latest market quote for one fixture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OddsLatestEntry {
    pub market: OutcomeValues,
    pub provider: Option<String>,
}

pub type PredictionsIndex = HashMap<u64, PredictionEntry>;
pub type ConsensusIndex = HashMap<u64, ConsensusEntry>;
pub type OddsLatestIndex = HashMap<u64, OddsLatestEntry>;

// ---------------------------------------------------------------------------
// Raw wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawAlert {
    fixture_id: Value,
    source: String,
    value_side: String,
    value_edge: Value,
}

#[derive(Debug, Deserialize)]
struct RawFixture {
    fixture_id: Value,
    status: String,
    #[serde(default)]
    home_score: Option<u32>,
    #[serde(default)]
    away_score: Option<u32>,
    #[serde(default)]
    league: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    #[serde(default)]
    prob: OutcomeValues,
    #[serde(default)]
    odds: Option<RawPredictionOdds>,
}

#[derive(Debug, Deserialize)]
struct RawPredictionOdds {
    #[serde(default)]
    odds_original: OutcomeValues,
}

#[derive(Debug, Deserialize)]
struct RawConsensus {
    #[serde(default)]
    blended_prob: OutcomeValues,
}

#[derive(Debug, Deserialize)]
struct RawOddsLatest {
    #[serde(default)]
    market: OutcomeValues,
    #[serde(default)]
    source: Option<String>,
}

/// Accept an id as a JSON integer or a numeric string.
fn id_from_value(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accept a number as a JSON number or a numeric string; must be finite.
fn number_from_value(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|x: &f64| x.is_finite())
}

impl TryFrom<RawAlert> for Signal {
    type Error = LedgerError;

    fn try_from(raw: RawAlert) -> Result<Self, Self::Error> {
        let fixture_id = id_from_value(&raw.fixture_id).ok_or_else(|| LedgerError::InvalidRecord {
            kind: "alert",
            message: format!("bad fixture_id {}", raw.fixture_id),
        })?;
        let edge = number_from_value(&raw.value_edge).ok_or_else(|| LedgerError::InvalidRecord {
            kind: "alert",
            message: format!("bad value_edge {}", raw.value_edge),
        })?;
        Ok(Signal {
            fixture_id,
            source: raw.source.parse::<Source>()?,
            side: raw.value_side.parse::<Side>()?,
            edge,
        })
    }
}

impl TryFrom<RawFixture> for Fixture {
    type Error = LedgerError;

    fn try_from(raw: RawFixture) -> Result<Self, Self::Error> {
        let fixture_id = id_from_value(&raw.fixture_id).ok_or_else(|| LedgerError::InvalidRecord {
            kind: "fixture",
            message: format!("bad fixture_id {}", raw.fixture_id),
        })?;
        Ok(Fixture {
            fixture_id,
            status: FixtureStatus::from_code(&raw.status),
            home_score: raw.home_score,
            away_score: raw.away_score,
            league: raw.league.filter(|l| !l.trim().is_empty()),
        })
    }
}

// ---------------------------------------------------------------------------
// Parsers (operate on already-decoded JSON)
// ---------------------------------------------------------------------------

/// Decode a JSON array record-by-record, skipping records that fail.
fn parse_records<R, T>(value: Value, kind: &'static str) -> Vec<T>
where
    R: for<'de> Deserialize<'de>,
    T: TryFrom<R, Error = LedgerError>,
{
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Vec::new(),
        other => {
            warn!(kind, found = %json_kind(&other), "Expected a JSON array, treating as empty");
            return Vec::new();
        }
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| {
            let raw: R = match serde_json::from_value(item) {
                Ok(r) => r,
                Err(e) => {
                    warn!(kind, error = %e, "Skipping malformed record");
                    return None;
                }
            };
            match T::try_from(raw) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(kind, error = %e, "Skipping invalid record");
                    None
                }
            }
        })
        .collect();

    if parsed.len() < total {
        debug!(kind, total, kept = parsed.len(), "Some records skipped");
    }
    parsed
}

/// Decode a JSON object keyed by fixture id, skipping bad keys and values.
fn parse_index<R, T>(value: Value, kind: &'static str, convert: impl Fn(R) -> T) -> HashMap<u64, T>
where
    R: for<'de> Deserialize<'de>,
{
    let map = match value {
        Value::Object(map) => map,
        Value::Null => return HashMap::new(),
        other => {
            warn!(kind, found = %json_kind(&other), "Expected a JSON object, treating as empty");
            return HashMap::new();
        }
    };

    let mut index = HashMap::with_capacity(map.len());
    for (key, item) in map {
        let Ok(fixture_id) = key.trim().parse::<u64>() else {
            warn!(kind, key = %key, "Skipping entry with non-numeric fixture id");
            continue;
        };
        match serde_json::from_value::<R>(item) {
            Ok(raw) => {
                index.insert(fixture_id, convert(raw));
            }
            Err(e) => warn!(kind, fixture_id, error = %e, "Skipping malformed entry"),
        }
    }
    index
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn parse_alerts(value: Value) -> Vec<Signal> {
    parse_records::<RawAlert, Signal>(value, "alert")
}

pub fn parse_fixtures(value: Value) -> HashMap<u64, Fixture> {
    parse_records::<RawFixture, Fixture>(value, "fixture")
        .into_iter()
        .map(|f| (f.fixture_id, f))
        .collect()
}

pub fn parse_predictions(value: Value) -> PredictionsIndex {
    parse_index(value, "prediction", |raw: RawPrediction| PredictionEntry {
        prob: raw.prob.as_probabilities(),
        odds_original: raw.odds.map(|o| o.odds_original).unwrap_or_default().as_prices(),
    })
}

pub fn parse_consensus(value: Value) -> ConsensusIndex {
    parse_index(value, "consensus", |raw: RawConsensus| ConsensusEntry {
        blended_prob: raw.blended_prob.as_probabilities(),
    })
}

pub fn parse_odds_latest(value: Value) -> OddsLatestIndex {
    parse_index(value, "odds_latest", |raw: RawOddsLatest| OddsLatestEntry {
        market: raw.market.as_prices(),
        provider: raw.source.filter(|s| !s.trim().is_empty()),
    })
}

// ---------------------------------------------------------------------------
// File loading
// ---------------------------------------------------------------------------

/// Read and decode a JSON file. Missing or malformed files yield `Null`.
pub fn read_json(path: &Path) -> Value {
    if !path.exists() {
        debug!(path = %path.display(), "Input file not found, treating as empty");
        return Value::Null;
    }
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read input file, treating as empty");
            return Value::Null;
        }
    };
    match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed JSON in input file, treating as empty");
            Value::Null
        }
    }
}

/// Everything one run consumes from upstream collaborators.
#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    pub signals: Vec<Signal>,
    pub fixtures: HashMap<u64, Fixture>,
    pub predictions: PredictionsIndex,
    pub consensus: ConsensusIndex,
    pub odds_latest: OddsLatestIndex,
}

impl InputSnapshot {
    /// Load every input file. Never fails.
    pub fn load(paths: &PathsConfig) -> Self {
        let snapshot = Self {
            signals: parse_alerts(read_json(&paths.alerts)),
            fixtures: parse_fixtures(read_json(&paths.fixtures)),
            predictions: parse_predictions(read_json(&paths.predictions)),
            consensus: parse_consensus(read_json(&paths.consensus)),
            odds_latest: parse_odds_latest(read_json(&paths.odds_latest)),
        };
        info!(
            alerts = snapshot.signals.len(),
            fixtures = snapshot.fixtures.len(),
            predictions = snapshot.predictions.len(),
            consensus = snapshot.consensus.len(),
            odds = snapshot.odds_latest.len(),
            "Inputs loaded"
        );
        snapshot
    }

    /// Model probability backing a signal, per its source.
    pub fn model_prob(&self, signal: &Signal) -> Option<f64> {
        let from_prediction = || {
            self.predictions
                .get(&signal.fixture_id)
                .and_then(|p| p.prob.get(signal.side))
        };
        let from_consensus = || {
            self.consensus
                .get(&signal.fixture_id)
                .and_then(|c| c.blended_prob.get(signal.side))
        };
        match signal.source {
            Source::Prediction => from_prediction(),
            Source::Consensus => from_consensus(),
            Source::Merged => from_consensus().or_else(from_prediction),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
