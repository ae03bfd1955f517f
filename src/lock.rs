//! # Cross-Process Lock
//!
//! At most one backup of a repository runs at a time, enforced by a lock
//! *directory* at `<backupDir>/<repoKey>/.backup.lock`. `mkdir` is atomic on
//! every filesystem that matters, including NFS, which makes the directory
//! itself the exclusion primitive; the `info` file inside merely describes
//! the holder.
//!
//! A lock left behind by a crash must not wedge backups forever, so
//! acquisition validates an existing lock before giving up:
//!
//! 1. Records older than 24 hours are stale.
//! 2. Records from another host are honored unconditionally: liveness
//!    cannot be probed across machines.
//! 3. A process-start-token mismatch means the PID was recycled: stale.
//! 4. A dead PID is stale.
//!
//! A stale lock is removed and acquisition retried exactly once. Long
//! backups keep their record fresh with [`RefreshTimer`] so rule 1 never
//! fires on a legitimately slow copy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filesystem;
use crate::process;

/// Name of the record file inside the lock directory.
const INFO_FILE: &str = "info";

/// A lock record becomes stale after this many hours without a refresh.
pub const LOCK_MAX_AGE_HOURS: i64 = 24;

/// Serialized description of a lock holder.
///
/// All fields except `pid` and `start_time` are optional on read: older
/// devback versions wrote a three-line text file (`pid`, unix seconds,
/// hostname), which is still accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockRecord {
    pub pid: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub process_start_id: String,
    #[serde(default)]
    pub repo_path: String,
    #[serde(default)]
    pub backup_dir: String,
}

impl LockRecord {
    /// Builds a record describing the current process.
    pub fn for_current_process(repo_path: &Path, backup_dir: &Path) -> LockRecord {
        let pid = process::pid();
        LockRecord {
            pid,
            start_time: Utc::now(),
            hostname: local_hostname(),
            process_start_id: process::start_id(pid).unwrap_or_default(),
            repo_path: repo_path.to_string_lossy().into_owned(),
            backup_dir: backup_dir.to_string_lossy().into_owned(),
        }
    }
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A held lock. Dropping the guard releases it (best effort); call
/// [`release`](LockGuard::release) to observe errors.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    /// Path of the lock directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the lock by removing its directory.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        fs::remove_dir_all(&self.path)
            .map_err(|e| Error::critical(format!("release lock {}: {}", self.path.display(), e)))
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = fs::remove_dir_all(&self.path) {
                if !filesystem::is_not_found(&err) {
                    warn!("release lock {}: {}", self.path.display(), err);
                }
            }
        }
    }
}

/// Attempts to acquire the lock at `lock_dir`.
///
/// Returns [`Error::LockBusy`] when a validated holder exists. A stale lock
/// is removed and the acquisition retried once.
pub fn acquire(lock_dir: &Path, record: &LockRecord) -> Result<LockGuard> {
    match try_mkdir_and_write(lock_dir, record)? {
        Some(guard) => return Ok(guard),
        None => debug!("lock directory exists: {}", lock_dir.display()),
    }

    if is_record_held(lock_dir, Utc::now()) {
        return Err(Error::LockBusy);
    }

    debug!("removing stale lock: {}", lock_dir.display());
    fs::remove_dir_all(lock_dir)
        .map_err(|e| Error::critical(format!("remove stale lock: {}", e)))?;

    match try_mkdir_and_write(lock_dir, record)? {
        Some(guard) => Ok(guard),
        // Lost the re-acquisition race to another process.
        None => Err(Error::LockBusy),
    }
}

fn try_mkdir_and_write(lock_dir: &Path, record: &LockRecord) -> Result<Option<LockGuard>> {
    match fs::create_dir(lock_dir) {
        Ok(()) => {}
        Err(err) if filesystem::is_already_exists(&err) => return Ok(None),
        Err(err) => {
            return Err(Error::critical(format!(
                "create lock directory {}: {}",
                lock_dir.display(),
                err
            )))
        }
    }
    let _ = filesystem::set_mode(lock_dir, 0o750);
    write_record(lock_dir, record)?;
    Ok(Some(LockGuard {
        path: lock_dir.to_path_buf(),
        released: false,
    }))
}

fn write_record(lock_dir: &Path, record: &LockRecord) -> Result<()> {
    let data = serde_json::to_vec(record)
        .map_err(|e| Error::critical(format!("serialize lock record: {}", e)))?;
    let info = lock_dir.join(INFO_FILE);
    fs::write(&info, data)
        .map_err(|e| Error::critical(format!("write lock record {}: {}", info.display(), e)))?;
    let _ = filesystem::set_mode(&info, 0o600);
    Ok(())
}

/// Reads the lock record, accepting the JSON format and the legacy
/// three-line text format.
pub fn read_record(lock_dir: &Path) -> Result<LockRecord> {
    let info = lock_dir.join(INFO_FILE);
    let data = fs::read_to_string(&info)
        .map_err(|e| Error::critical(format!("read lock record {}: {}", info.display(), e)))?;

    if let Ok(record) = serde_json::from_str::<LockRecord>(&data) {
        return Ok(record);
    }
    parse_legacy_record(&data)
        .ok_or_else(|| Error::critical(format!("invalid lock record in {}", info.display())))
}

fn parse_legacy_record(data: &str) -> Option<LockRecord> {
    let mut lines = data.trim().lines();
    let pid: u32 = lines.next()?.trim().parse().ok()?;
    let unix_secs: i64 = lines.next()?.trim().parse().ok()?;
    let start_time = DateTime::<Utc>::from_timestamp(unix_secs, 0)?;
    let hostname = lines.next().unwrap_or("").trim().to_string();
    Some(LockRecord {
        pid,
        start_time,
        hostname,
        process_start_id: String::new(),
        repo_path: String::new(),
        backup_dir: String::new(),
    })
}

/// Decides whether the lock at `lock_dir` is still held by a live owner.
///
/// An unreadable or malformed record counts as not held; a crashed writer
/// must not block backups indefinitely.
pub fn is_record_held(lock_dir: &Path, now: DateTime<Utc>) -> bool {
    let record = match read_record(lock_dir) {
        Ok(record) => record,
        Err(_) => return false,
    };
    validate(&record, now)
}

/// Validation rules, in order. See the module docs.
pub fn validate(record: &LockRecord, now: DateTime<Utc>) -> bool {
    if now.signed_duration_since(record.start_time) > chrono::Duration::hours(LOCK_MAX_AGE_HOURS) {
        return false;
    }

    if !record.hostname.is_empty() {
        let local = local_hostname();
        if !local.is_empty() && local != record.hostname {
            // Never steal across hosts; liveness is unknowable from here.
            return true;
        }
    }

    if !record.process_start_id.is_empty() {
        return match process::start_id(record.pid) {
            Some(id) => id == record.process_start_id,
            // The record promises a token we cannot reproduce: PID reused
            // by a process we cannot inspect, or it is gone entirely.
            None => false,
        };
    }

    process::is_alive(record.pid)
}

/// Checks lock state without acquiring: `(held, record if readable)`.
pub fn inspect(lock_dir: &Path) -> (bool, Option<LockRecord>) {
    if !lock_dir.exists() {
        return (false, None);
    }
    match read_record(lock_dir) {
        Ok(record) => {
            let held = validate(&record, Utc::now());
            (held, Some(record))
        }
        Err(_) => (false, None),
    }
}

/// Rewrites the record with a fresh `start_time`, keeping everything else.
pub fn refresh(lock_dir: &Path) -> Result<()> {
    let mut record = read_record(lock_dir)?;
    record.start_time = Utc::now();
    write_record(lock_dir, &record)
}

/// Exercises acquire / busy / refresh / release end-to-end in a scratch
/// directory. This backs the `devback test-locks` command and doubles as a
/// smoke test for the platform probes on unusual systems.
pub fn self_test(repo_path: &Path, backup_dir: &Path) -> Result<()> {
    let scratch = std::env::temp_dir().join(format!("devback-test-locks-{}", process::pid()));
    fs::create_dir_all(&scratch)
        .map_err(|e| Error::critical(format!("create test directory: {}", e)))?;
    let outcome = self_test_in(&scratch, repo_path, backup_dir);
    let _ = fs::remove_dir_all(&scratch);
    outcome
}

fn self_test_in(scratch: &Path, repo_path: &Path, backup_dir: &Path) -> Result<()> {
    let lock_dir = scratch.join(".test.lock");
    let record = LockRecord::for_current_process(repo_path, backup_dir);

    debug!("test 1: acquiring lock");
    let guard = acquire(&lock_dir, &record)?;

    debug!("test 2: checking lock status");
    let (held, info) = inspect(&lock_dir);
    if !held {
        return Err(Error::critical("lock should be active but is not detected"));
    }
    if let Some(info) = info {
        debug!("lock is active: pid={} host={}", info.pid, info.hostname);
    }

    debug!("test 3: second acquisition must fail");
    match acquire(&lock_dir, &record) {
        Err(Error::LockBusy) => {}
        Err(err) => return Err(err),
        Ok(_) => {
            return Err(Error::critical(
                "second acquisition should have reported the lock as busy",
            ))
        }
    }

    debug!("test 4: refreshing lock");
    refresh(&lock_dir)?;

    debug!("test 5: releasing lock");
    guard.release()?;

    debug!("test 6: lock must be free after release");
    let (held, _) = inspect(&lock_dir);
    if held {
        return Err(Error::critical("lock should not be active after release"));
    }

    debug!("test 7: re-acquiring after release");
    let guard = acquire(&lock_dir, &record)?;
    guard.release()?;

    Ok(())
}

/// Background refresher keeping a held lock from expiring during long
/// copies. Stopped (and joined) by [`stop`](RefreshTimer::stop) or by drop.
pub struct RefreshTimer {
    state: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    /// Spawns a refresher for `lock_dir` firing every `interval`.
    pub fn start(lock_dir: PathBuf, interval: Duration) -> RefreshTimer {
        let state = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_state = Arc::clone(&state);
        let handle = std::thread::spawn(move || {
            let (stop, cv) = &*thread_state;
            let mut stopped = stop.lock().unwrap();
            loop {
                let (guard, timeout) = cv.wait_timeout(stopped, interval).unwrap();
                stopped = guard;
                if *stopped {
                    return;
                }
                if timeout.timed_out() {
                    if let Err(err) = refresh(&lock_dir) {
                        warn!("refresh lock: {}", err);
                    }
                }
            }
        });
        RefreshTimer {
            state,
            handle: Some(handle),
        }
    }

    /// Stops the refresher and waits for the thread to exit.
    pub fn stop(&mut self) {
        let (stop, cv) = &*self.state;
        *stop.lock().unwrap() = true;
        cv.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
