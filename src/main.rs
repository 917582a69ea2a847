//! Tipster Ledger entry point.
//!
//! Loads configuration, initialises structured logging and runs one
//! ledger cycle, or keeps cycling on an interval with `--watch` until
//! Ctrl+C.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use tipster_ledger::config::LedgerConfig;
use tipster_ledger::engine::{self, CycleReport};

#[derive(Parser, Debug)]
#[command(name = "tipster-ledger")]
#[command(about = "Simulated betting ledger: intake, settlement and risk analytics")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "LEDGER_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Keep running, one cycle per `schedule.interval_secs`
    #[arg(long)]
    watch: bool,

    /// Override the run clock (RFC 3339), single-run mode only
    #[arg(long)]
    now: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();
    let args = Args::parse();

    init_logging();

    let cfg = if args.config.exists() {
        LedgerConfig::load(&args.config)?
    } else {
        warn!(path = %args.config.display(), "Config file not found, using defaults");
        LedgerConfig::default()
    };

    info!(
        config = %args.config.display(),
        ledger = %cfg.paths.ledger.display(),
        kelly = cfg.staking.kelly_enabled,
        min_edge = cfg.intake.min_edge,
        "Tipster ledger starting up"
    );

    if !args.watch {
        let now = args.now.unwrap_or_else(Utc::now);
        let report = engine::run_cycle(&cfg, now).context("Ledger cycle failed")?;
        log_cycle_report(&report);
        return Ok(());
    }

    // -- Watch loop ------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.schedule.interval_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.schedule.interval_secs,
        "Entering watch loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match engine::run_cycle(&cfg, Utc::now()) {
                    Ok(report) => log_cycle_report(&report),
                    Err(e) => error!(error = %format!("{e:#}"), "Cycle failed, retrying next tick"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("Tipster ledger shut down cleanly.");
    Ok(())
}

/// Log a human-readable cycle summary.
fn log_cycle_report(report: &CycleReport) {
    info!(
        at = %report.timestamp,
        settled = report.settlement.settled,
        wins = report.settlement.wins,
        losses = report.settlement.losses,
        considered = report.intake.considered,
        accepted = report.intake.accepted,
        archived = report.archived,
        ledger = report.ledger_size,
        open = report.open_picks,
        profit = format!("{:.2}u", report.profit_units),
        stake_factor = report.recommended_stake_factor,
        "Run summary"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tipster_ledger=info"));

    let json_logging = std::env::var("LEDGER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
