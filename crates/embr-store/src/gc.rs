//! Pruning of objects no set refers to.
//!
//! An object is reachable while any set's log, index, or model refs names
//! it. Unreachable objects are deleted once their file is older than the
//! grace period. Only one collection runs at a time per repository,
//! guarded by `.eb/gc.lock`.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use embr_types::ObjectId;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::repository::Repository;
use crate::traits::ObjectStore;

pub const GC_LOCK_FILE: &str = "gc.lock";

/// Grace period applied when none is given: two weeks.
pub const DEFAULT_PRUNE_EXPIRE: Duration = Duration::from_secs(14 * 24 * 60 * 60);

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// How old an unreachable object must be before it is deleted.
///
/// Parsed from `now`, `never`, or `<n>.<unit>.ago` where unit is one of
/// second, minute, hour, day, week, month (30 days), or year (365 days),
/// singular or plural.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PruneExpire {
    Never,
    OlderThan(Duration),
}

impl Default for PruneExpire {
    fn default() -> Self {
        Self::OlderThan(DEFAULT_PRUNE_EXPIRE)
    }
}

impl FromStr for PruneExpire {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidParameter(format!("invalid expiration format: {s}"));
        match s {
            "now" => return Ok(Self::OlderThan(Duration::ZERO)),
            "never" => return Ok(Self::Never),
            _ => {}
        }
        let mut parts = s.split('.');
        let (Some(count), Some(unit), Some("ago"), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let count: u64 = count.parse().map_err(|_| invalid())?;
        let unit = match unit.strip_suffix('s').unwrap_or(unit) {
            "second" => 1,
            "minute" => MINUTE,
            "hour" => HOUR,
            "day" => DAY,
            "week" => 7 * DAY,
            "month" => 30 * DAY,
            "year" => 365 * DAY,
            _ => return Err(invalid()),
        };
        let secs = count.checked_mul(unit).ok_or_else(invalid)?;
        Ok(Self::OlderThan(Duration::from_secs(secs)))
    }
}

/// Result of garbage collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    pub objects_removed: usize,
    pub bytes_freed: u64,
    /// Unreachable objects left alone because they are still within the
    /// grace period.
    pub objects_kept: usize,
}

/// Exclusive `gc.lock` held for the lifetime of the guard.
#[derive(Debug)]
pub struct GcLock {
    path: PathBuf,
}

impl GcLock {
    /// Create the lock file, recording this process id.
    ///
    /// A lock left behind by a process that no longer exists is replaced.
    pub fn acquire(eb_dir: &Path) -> StoreResult<Self> {
        let path = eb_dir.join(GC_LOCK_FILE);
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())?;
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !is_stale(&path)? {
                        return Err(StoreError::Locked(path));
                    }
                    warn!(path = %path.display(), "removing stale gc lock");
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Locked(path))
    }
}

impl Drop for GcLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove gc lock");
        }
    }
}

/// A lock is stale when its recorded process is gone. Without `/proc` the
/// owner cannot be checked and the lock is honoured.
fn is_stale(path: &Path) -> StoreResult<bool> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    let Ok(pid) = text.trim().parse::<u32>() else {
        return Ok(true);
    };
    let proc = Path::new("/proc");
    Ok(proc.is_dir() && !proc.join(pid.to_string()).exists())
}

impl Repository {
    /// Every object named by any set's log, index, or model refs.
    pub fn reachable_objects(&self) -> StoreResult<BTreeSet<ObjectId>> {
        let mut reachable = BTreeSet::new();
        for name in self.list_sets()? {
            let set = self.set(&name)?;
            reachable.extend(set.read_log()?.iter().map(|e| *e.hash()));
            reachable.extend(set.read_index()?.into_iter().map(|e| e.hash));
            reachable.extend(set.read_model_refs()?.into_values());
        }
        Ok(reachable)
    }

    /// Delete unreachable objects older than `expire`.
    pub fn gc(&self, expire: PruneExpire) -> StoreResult<GcReport> {
        let _lock = GcLock::acquire(self.context().eb_dir())?;
        let mut report = GcReport::default();
        let PruneExpire::OlderThan(grace) = expire else {
            info!("pruning disabled, no objects removed");
            return Ok(report);
        };
        let cutoff = SystemTime::now().checked_sub(grace).unwrap_or(SystemTime::UNIX_EPOCH);

        let reachable = self.reachable_objects()?;
        for id in self.store().object_ids()? {
            if reachable.contains(&id) {
                continue;
            }
            let Some(path) = self.store().object_path(&id) else {
                continue;
            };
            let meta = fs::metadata(&path)?;
            if meta.modified()? > cutoff {
                report.objects_kept += 1;
                continue;
            }
            if self.store().delete(&id)? {
                debug!(object = %id.short_hex(), bytes = meta.len(), "pruned object");
                report.objects_removed += 1;
                report.bytes_freed += meta.len();
            }
        }
        info!(
            removed = report.objects_removed,
            bytes = report.bytes_freed,
            kept = report.objects_kept,
            "garbage collection complete"
        );
        Ok(report)
    }
}
