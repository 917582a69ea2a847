//! Persistence layer.
//!
//! The ledger is a JSON array of picks on disk. Every write goes through
//! `write_atomic` (temp file + rename) so a crash never leaves a
//! half-written artifact behind. A missing or unreadable ledger loads as
//! empty; only write failures are surfaced to the caller.

pub mod export;
pub mod timeline;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{PruningConfig, MAX_PRUNE_AGE_DAYS};
use crate::types::{LedgerError, Pick};

// ---------------------------------------------------------------------------
// Atomic writes
// ---------------------------------------------------------------------------

fn persistence_error(path: &Path, err: impl std::fmt::Display) -> LedgerError {
    LedgerError::Persistence {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Write `bytes` to `<path>.tmp`, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| persistence_error(path, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(|e| persistence_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| persistence_error(path, e))?;
    Ok(())
}

pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Failed to serialise {}", path.display()))?;
    write_atomic(path, &json)
}

// ---------------------------------------------------------------------------
// Ledger store
// ---------------------------------------------------------------------------

/// Result of a pruning pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneOutcome {
    pub kept: Vec<Pick>,
    pub archived: Vec<Pick>,
}

pub struct LedgerStore {
    path: PathBuf,
    archive_path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>, archive_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            archive_path: archive_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the active ledger. Missing file is a fresh start; a corrupt
    /// file is copied aside to `<path>.corrupt` and treated as empty.
    pub fn load(&self) -> Vec<Pick> {
        let picks = read_picks(&self.path, "ledger");
        info!(path = %self.path.display(), picks = picks.len(), "Ledger loaded");
        picks
    }

    pub fn save(&self, ledger: &[Pick]) -> Result<()> {
        write_json_atomic(&self.path, ledger)
            .with_context(|| format!("Failed to save ledger to {}", self.path.display()))?;
        debug!(path = %self.path.display(), picks = ledger.len(), "Ledger saved");
        Ok(())
    }

    pub fn load_archive(&self) -> Vec<Pick> {
        read_picks(&self.archive_path, "archive")
    }

    /// Append pruned picks to the archive collection, skipping ids already
    /// archived. Returns how many picks were added.
    pub fn append_archive(&self, picks: &[Pick]) -> Result<usize> {
        if picks.is_empty() {
            return Ok(0);
        }
        let mut archive = self.load_archive();
        let known: HashSet<_> = archive.iter().map(|p| p.id).collect();
        let fresh: Vec<Pick> = picks.iter().filter(|p| !known.contains(&p.id)).cloned().collect();
        if fresh.len() < picks.len() {
            warn!(
                path = %self.archive_path.display(),
                skipped = picks.len() - fresh.len(),
                "Picks already archived, skipping"
            );
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        let added = fresh.len();
        archive.extend(fresh);
        write_json_atomic(&self.archive_path, &archive).with_context(|| {
            format!("Failed to write archive {}", self.archive_path.display())
        })?;
        info!(
            path = %self.archive_path.display(),
            added,
            total = archive.len(),
            "Archive updated"
        );
        Ok(added)
    }
}

fn read_picks(path: &Path, label: &str) -> Vec<Pick> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No {label} file found, starting fresh");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read {label}, treating as empty");
            return Vec::new();
        }
    };
    if contents.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<Pick>>(&contents) {
        Ok(picks) => picks,
        Err(e) => {
            let mut backup = path.as_os_str().to_owned();
            backup.push(".corrupt");
            let backup = PathBuf::from(backup);
            if let Err(copy_err) = fs::copy(path, &backup) {
                warn!(error = %copy_err, "Failed to back up corrupt {label}");
            }
            warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %e,
                "Corrupt {label} file, treating as empty"
            );
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Remove settled picks older than `max_age_days`, then the oldest
/// settled picks until the ledger fits `max_count`. Open picks always stay.
pub fn prune(ledger: Vec<Pick>, cfg: &PruningConfig, now: DateTime<Utc>) -> PruneOutcome {
    let cutoff = now - Duration::days(cfg.max_age_days.clamp(0, MAX_PRUNE_AGE_DAYS));
    let (mut kept, mut archived): (Vec<Pick>, Vec<Pick>) = ledger
        .into_iter()
        .partition(|p| p.is_open() || p.settled_at.unwrap_or(p.created_at) >= cutoff);

    if kept.len() > cfg.max_count {
        let excess = kept.len() - cfg.max_count;
        let mut settled_idx: Vec<usize> = (0..kept.len()).filter(|&i| kept[i].settled).collect();
        settled_idx.sort_by_key(|&i| (kept[i].created_at, kept[i].fixture_id));
        let mut drop = vec![false; kept.len()];
        for &i in settled_idx.iter().take(excess) {
            drop[i] = true;
        }

        let mut remaining = Vec::with_capacity(kept.len());
        for (pick, dropped) in kept.into_iter().zip(drop) {
            if dropped {
                archived.push(pick);
            } else {
                remaining.push(pick);
            }
        }
        kept = remaining;
    }

    if !archived.is_empty() {
        info!(
            pruned = archived.len(),
            kept = kept.len(),
            max_age_days = cfg.max_age_days,
            max_count = cfg.max_count,
            "Ledger pruned"
        );
    }
    PruneOutcome { kept, archived }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
