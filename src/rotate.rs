//! # Snapshot Rotation
//!
//! Applies the retention policy to the completed snapshots of one
//! repository. Three rules run in fixed order (age, then count, then total
//! size), each marking victims in a shared liveness vector so later rules
//! see what earlier rules already removed.
//!
//! Rotation is deliberately forgiving: it never fails the enclosing backup.
//! Every problem is logged and skipped. In dry-run mode the same decisions
//! are logged but nothing is deleted, so repeated dry runs never mutate
//! disk.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::config::Config;
use crate::filesystem;
use crate::snapshot::{self, Snapshot};

/// Applies the retention rules under `repo_dir`.
///
/// `now` is captured by the caller so tests can rotate against a fixed
/// clock.
pub fn rotate_repo(repo_dir: &Path, cfg: &Config, dry_run: bool, now: DateTime<Utc>) {
    let snaps = match snapshot::list_snapshots(repo_dir) {
        Ok(snaps) => snaps,
        Err(err) => {
            warn!("rotation(list): {}", err);
            return;
        }
    };
    let mut alive = vec![true; snaps.len()];

    apply_keep_days(cfg, dry_run, &snaps, &mut alive, now);
    apply_keep_count(cfg, dry_run, &snaps, &mut alive);
    apply_size_limit(cfg, dry_run, &snaps, &mut alive);

    if dry_run {
        info!("rotation was a dry run; no deletions performed");
    }
}

fn apply_keep_days(
    cfg: &Config,
    dry_run: bool,
    snaps: &[Snapshot],
    alive: &mut [bool],
    now: DateTime<Utc>,
) {
    if cfg.keep_days <= 0 {
        return;
    }
    let limit_secs = cfg.keep_days * 24 * 60 * 60;
    for (i, snap) in snaps.iter().enumerate() {
        if !alive[i] {
            continue;
        }
        let Ok(meta) = fs::metadata(&snap.done) else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let age_secs = now
            .signed_duration_since(DateTime::<Utc>::from(modified))
            .num_seconds();
        if age_secs > limit_secs {
            info!(
                "[rotate:age] remove {} (older than {}d)",
                snap.time_dir.display(),
                cfg.keep_days
            );
            if !dry_run {
                remove_snapshot(snap);
            }
            alive[i] = false;
        }
    }
}

fn apply_keep_count(cfg: &Config, dry_run: bool, snaps: &[Snapshot], alive: &mut [bool]) {
    if cfg.keep_count <= 0 {
        return;
    }
    let living = alive.iter().filter(|a| **a).count() as i64;
    if living <= cfg.keep_count {
        return;
    }
    let mut to_remove = living - cfg.keep_count;
    for (i, snap) in snaps.iter().enumerate() {
        if to_remove == 0 {
            break;
        }
        if !alive[i] {
            continue;
        }
        info!(
            "[rotate:count] remove {} (exceeds {})",
            snap.time_dir.display(),
            cfg.keep_count
        );
        if !dry_run {
            remove_snapshot(snap);
        }
        alive[i] = false;
        to_remove -= 1;
    }
}

fn apply_size_limit(cfg: &Config, dry_run: bool, snaps: &[Snapshot], alive: &mut [bool]) {
    if cfg.max_total_gb <= 0 || cfg.no_size {
        return;
    }
    // A negative margin is accepted and tightens the limit.
    let limit_kb = cfg.max_total_gb * 1024 * 1024 + cfg.size_margin_mb * 1024;

    let mut sizes = vec![0i64; snaps.len()];
    let mut total_kb: i64 = 0;
    for (i, snap) in snaps.iter().enumerate() {
        if !alive[i] {
            continue;
        }
        sizes[i] = snapshot::dir_size_kb(&snap.time_dir);
        total_kb += sizes[i];
    }
    debug!(
        "[rotate:size] total={} limit={}",
        snapshot::human_kb(total_kb),
        snapshot::human_kb(limit_kb)
    );

    for (i, snap) in snaps.iter().enumerate() {
        if total_kb <= limit_kb {
            break;
        }
        if !alive[i] {
            continue;
        }
        info!(
            "[rotate:size] remove {} (total {} > {})",
            snap.time_dir.display(),
            snapshot::human_kb(total_kb),
            snapshot::human_kb(limit_kb)
        );
        if !dry_run {
            remove_snapshot(snap);
        }
        total_kb -= sizes[i];
        alive[i] = false;
    }
}

fn remove_snapshot(snap: &Snapshot) {
    info!("[rotate] remove {}", snap.time_dir.display());
    if let Err(err) = fs::remove_dir_all(&snap.time_dir) {
        warn!("rotation(remove {}): {}", snap.time_dir.display(), err);
    }
    if let Err(err) = filesystem::remove_dir_if_empty(&snap.date_dir) {
        warn!("rotation(date dir): {}", err);
    }
}
