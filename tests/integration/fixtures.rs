//! On-disk test workspace.
//!
//! Builds a throwaway data directory with the five input feeds and a
//! config pointing every path into it.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use tipster_ledger::config::{LedgerConfig, PathsConfig};

pub struct Workspace {
    pub dir: PathBuf,
    pub config: LedgerConfig,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("tipster_ledger_it_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let mut config = LedgerConfig::default();
        config.paths = PathsConfig::under(&dir);
        config.metrics.monte_carlo.seed = Some(11);
        config.export.csv_enabled = true;
        Self { dir, config }
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.config.paths
    }

    fn write(&self, path: &Path, value: Value) {
        fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    pub fn alerts(&self, value: Value) {
        self.write(&self.paths().alerts, value);
    }

    pub fn fixtures(&self, value: Value) {
        self.write(&self.paths().fixtures, value);
    }

    pub fn odds_latest(&self, value: Value) {
        self.write(&self.paths().odds_latest, value);
    }

    pub fn predictions(&self, value: Value) {
        self.write(&self.paths().predictions, value);
    }

    pub fn read_json(&self, path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    pub fn ledger(&self) -> Vec<Value> {
        match self.read_json(&self.paths().ledger) {
            Value::Array(items) => items,
            other => panic!("ledger is not an array: {other}"),
        }
    }

    /// Make the next atomic write to `path` fail by parking a directory
    /// where its temp file goes.
    pub fn block_write(&self, path: &Path) -> PathBuf {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::create_dir_all(&tmp).unwrap();
        tmp
    }

    /// Two pre-match fixtures with full markets, one live, one unknown alert.
    pub fn seed_standard(&self) {
        self.fixtures(json!([
            {"fixture_id": 101, "status": "NS", "home_score": null, "away_score": null, "league": "Serie A"},
            {"fixture_id": 102, "status": "NS", "home_score": null, "away_score": null},
            {"fixture_id": 103, "status": "2H", "home_score": 1, "away_score": 0}
        ]));
        self.odds_latest(json!({
            "101": {"market": {"home_win": 2.2, "draw": 3.4, "away_win": 3.3}, "source": "pinnacle"},
            "102": {"market": {"home_win": 1.8, "draw": 3.6, "away_win": 4.5}}
        }));
        self.predictions(json!({
            "101": {"prob": {"home_win": 0.55, "draw": 0.25, "away_win": 0.20}},
            "102": {"prob": {"home_win": 0.50, "draw": 0.30, "away_win": 0.20}}
        }));
        self.alerts(json!([
            {"fixture_id": 101, "source": "prediction", "value_side": "home_win", "value_edge": 0.09},
            {"fixture_id": 102, "source": "consensus", "value_side": "draw", "value_edge": 0.04},
            {"fixture_id": 103, "source": "merged", "value_side": "home_win", "value_edge": 0.12},
            {"fixture_id": 101, "source": "prediction", "value_side": "home_win", "value_edge": 0.09},
            {"fixture_id": 999, "source": "prediction", "value_side": "away_win", "value_edge": 0.20},
            {"fixture_id": 102, "source": "prediction", "value_side": "away_win", "value_edge": "n/a"}
        ]));
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}
