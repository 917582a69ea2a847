//! Full-cycle behaviour: intake, idempotency, settlement, exports,
//! pruning and the analytics artifacts.

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::fs;

use tipster_ledger::engine::run_cycle;
use tipster_ledger::storage::timeline::{load_daily, load_timeline};

use crate::fixtures::Workspace;

#[test]
fn test_first_cycle_opens_pre_match_picks_only() {
    let ws = Workspace::new();
    ws.seed_standard();
    let now = Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap();

    let report = run_cycle(&ws.config, now).unwrap();
    assert_eq!(report.intake.considered, 5);
    assert_eq!(report.intake.accepted, 2);
    assert_eq!(report.intake.rejected_not_pre_match, 1);
    assert_eq!(report.intake.rejected_duplicate, 1);
    assert_eq!(report.intake.rejected_fixture_missing, 1);
    assert_eq!(report.ledger_size, 2);
    assert_eq!(report.open_picks, 2);

    let ledger = ws.ledger();
    let ids: Vec<u64> = ledger.iter().map(|p| p["fixture_id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![101, 102]);
    assert!(!ids.contains(&103));

    let first = &ledger[0];
    assert_eq!(first["decimal_odds"], json!(2.2));
    assert_eq!(first["odds_source"], json!("odds_latest"));
    assert_eq!(first["league"], json!("Serie A"));
    assert_eq!(first["stake_strategy"], json!("fixed"));
    assert_eq!(first["snapshot_provider"], json!("pinnacle"));
    assert!(first["snapshot_overround"].as_f64().unwrap() > 0.0);
    assert_eq!(first["settled"], json!(false));
}

#[test]
fn test_rerun_is_idempotent() {
    let ws = Workspace::new();
    ws.seed_standard();
    let now = Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap();

    run_cycle(&ws.config, now).unwrap();
    let second = run_cycle(&ws.config, now + Duration::minutes(15)).unwrap();
    assert_eq!(second.intake.accepted, 0);
    assert_eq!(second.intake.rejected_duplicate, 3);
    assert_eq!(ws.ledger().len(), 2);
}

#[test]
fn test_kelly_staking_uses_model_probability() {
    let mut ws = Workspace::new();
    ws.config.staking.kelly_enabled = true;
    ws.seed_standard();
    let now = Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap();

    run_cycle(&ws.config, now).unwrap();
    let ledger = ws.ledger();
    // 101: odds 2.2, p 0.55 → f = 0.175
    assert_eq!(ledger[0]["stake_strategy"], json!("kelly"));
    assert!((ledger[0]["stake"].as_f64().unwrap() - 0.175).abs() < 1e-9);
    // 102 consensus has no blended probability → fixed fallback
    assert_eq!(ledger[1]["stake_strategy"], json!("fixed"));
    assert_eq!(ledger[1]["stake"], json!(1.0));
}

#[test]
fn test_settlement_and_clv_on_later_cycle() {
    let ws = Workspace::new();
    ws.seed_standard();
    let t0 = Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap();
    run_cycle(&ws.config, t0).unwrap();

    ws.fixtures(json!([
        {"fixture_id": 101, "status": "FT", "home_score": 2, "away_score": 0},
        {"fixture_id": 102, "status": "FT", "home_score": 1, "away_score": null}
    ]));
    ws.odds_latest(json!({
        "101": {"market": {"home_win": 2.0, "draw": 3.5, "away_win": 3.6}}
    }));

    let report = run_cycle(&ws.config, t0 + Duration::hours(3)).unwrap();
    assert_eq!(report.settlement.settled, 1);
    assert_eq!(report.settlement.wins, 1);
    assert_eq!(report.settlement.awaiting_scores, 1);
    assert_eq!(report.intake.accepted, 0);

    let ledger = ws.ledger();
    let won = &ledger[0];
    assert_eq!(won["result"], json!("win"));
    assert!((won["payout"].as_f64().unwrap() - 2.2).abs() < 1e-12);
    assert!(won["clv_pct"].as_f64().unwrap() < 0.0);
    assert_eq!(ledger[1]["settled"], json!(false));

    let metrics = ws.read_json(&ws.paths().metrics);
    assert_eq!(metrics["totals"]["settled"], json!(1));
    assert!((metrics["totals"]["profit_units"].as_f64().unwrap() - 1.2).abs() < 1e-9);
    assert_eq!(metrics["equity"]["equity_points"], json!(1));

    // Scores arrive on the next run.
    ws.fixtures(json!([
        {"fixture_id": 102, "status": "FT", "home_score": 1, "away_score": 1}
    ]));
    let report = run_cycle(&ws.config, t0 + Duration::hours(4)).unwrap();
    assert_eq!(report.settlement.settled, 1);
    assert_eq!(ws.ledger()[1]["result"], json!("win"));
    assert_eq!(report.open_picks, 0);
}

#[test]
fn test_exports_timeline_and_daily_rollup() {
    let ws = Workspace::new();
    ws.seed_standard();
    let t0 = Utc.with_ymd_and_hms(2024, 5, 4, 9, 0, 0).unwrap();

    run_cycle(&ws.config, t0).unwrap();
    run_cycle(&ws.config, t0 + Duration::hours(2)).unwrap();
    run_cycle(&ws.config, t0 + Duration::days(1)).unwrap();

    let timeline = load_timeline(&ws.paths().timeline);
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline[0].total_picks, 2);

    let daily = load_daily(&ws.paths().daily);
    assert_eq!(daily["2024-05-04"].runs, 2);
    assert_eq!(daily["2024-05-05"].runs, 1);

    let compact = ws.read_json(&ws.paths().metrics_compact);
    assert_eq!(compact["open_picks"], json!(2));
    assert!(compact.get("yield").is_some());

    let csv = fs::read_to_string(&ws.paths().ledger_csv).unwrap();
    assert_eq!(csv.lines().count(), 3);
}

#[test]
fn test_old_settled_picks_are_archived() {
    let ws = Workspace::new();
    ws.seed_standard();
    let t0 = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
    run_cycle(&ws.config, t0).unwrap();

    ws.fixtures(json!([
        {"fixture_id": 101, "status": "FT", "home_score": 0, "away_score": 1}
    ]));
    ws.alerts(json!([]));
    run_cycle(&ws.config, t0 + Duration::hours(3)).unwrap();

    let later = t0 + Duration::days(400);
    let report = run_cycle(&ws.config, later).unwrap();
    assert_eq!(report.pruned, 1);
    assert_eq!(report.archived, 1);

    // The still-open pick on 102 survives regardless of age.
    let ledger = ws.ledger();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0]["fixture_id"], json!(102));

    let archive = ws.read_json(&ws.paths().archive);
    assert_eq!(archive.as_array().unwrap().len(), 1);
    assert_eq!(archive[0]["result"], json!("loss"));
}

#[test]
fn test_failed_save_after_archive_does_not_duplicate_archive() {
    let ws = Workspace::new();
    ws.seed_standard();
    let t0 = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
    run_cycle(&ws.config, t0).unwrap();
    ws.fixtures(json!([
        {"fixture_id": 101, "status": "FT", "home_score": 2, "away_score": 0}
    ]));
    ws.alerts(json!([]));
    run_cycle(&ws.config, t0 + Duration::hours(3)).unwrap();

    let later = t0 + Duration::days(400);
    let blocker = ws.block_write(&ws.paths().ledger);
    assert!(run_cycle(&ws.config, later).is_err());
    assert_eq!(ws.ledger().len(), 2);
    assert_eq!(ws.read_json(&ws.paths().archive).as_array().unwrap().len(), 1);

    fs::remove_dir_all(blocker).unwrap();
    let report = run_cycle(&ws.config, later + Duration::hours(1)).unwrap();
    assert_eq!(report.pruned, 1);
    assert_eq!(report.archived, 0);
    assert_eq!(ws.ledger().len(), 1);

    let archive = ws.read_json(&ws.paths().archive);
    assert_eq!(archive.as_array().unwrap().len(), 1);
    assert_eq!(archive[0]["fixture_id"], json!(101));
}

#[test]
fn test_metrics_write_failure_fails_the_cycle() {
    let ws = Workspace::new();
    ws.seed_standard();
    ws.block_write(&ws.paths().metrics);

    let result = run_cycle(&ws.config, Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap());
    assert!(result.is_err());
    // The ledger is saved before metrics are computed.
    assert_eq!(ws.ledger().len(), 2);
    assert!(!ws.paths().metrics.exists());
}

#[test]
fn test_secondary_write_failures_only_log() {
    let ws = Workspace::new();
    ws.seed_standard();
    fs::create_dir_all(&ws.paths().timeline).unwrap();
    ws.block_write(&ws.paths().daily);
    ws.block_write(&ws.paths().metrics_compact);
    ws.block_write(&ws.paths().ledger_csv);

    let report = run_cycle(&ws.config, Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap()).unwrap();
    assert_eq!(report.intake.accepted, 2);
    assert_eq!(ws.ledger().len(), 2);
    assert!(ws.paths().metrics.exists());
    assert!(!ws.paths().daily.exists());
    assert!(!ws.paths().metrics_compact.exists());
    assert!(!ws.paths().ledger_csv.exists());
}

#[test]
fn test_missing_inputs_produce_empty_artifacts() {
    let ws = Workspace::new();
    let report = run_cycle(&ws.config, Utc::now()).unwrap();
    assert_eq!(report.ledger_size, 0);
    assert_eq!(ws.ledger().len(), 0);

    let metrics = ws.read_json(&ws.paths().metrics);
    assert_eq!(metrics["totals"]["total"], json!(0));
    assert!(metrics["risk_of_ruin"].is_null());
}

#[test]
fn test_corrupt_ledger_is_treated_as_empty() {
    let ws = Workspace::new();
    ws.seed_standard();
    fs::write(&ws.paths().ledger, "[{\"broken\": ").unwrap();

    let report = run_cycle(&ws.config, Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap()).unwrap();
    assert_eq!(report.intake.accepted, 2);
    let mut backup = ws.paths().ledger.as_os_str().to_owned();
    backup.push(".corrupt");
    assert!(std::path::Path::new(&backup).exists());
}
