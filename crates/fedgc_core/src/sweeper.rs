//! Drains the final bad index into batched deletion transactions
//! (spec.md §4.5).

use crate::badindex::BadIndex;
use crate::error::{GcError, Result, StorageError};
use crate::oid::DbName;
use crate::storage::Storage;
use std::collections::BTreeMap;

/// A source of monotonic wall-clock seconds, injected so tests never block
/// on a real timer (spec.md §9's "mutable module-level state" redesign).
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// The real clock, used by the CLI binaries.
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_secs_f64()
    }
}

/// A sink for the Sweeper's back-pressure sleeps, injected for the same
/// reason as [`Clock`].
pub trait Sleeper: Send + Sync {
    fn sleep(&self, secs: f64);
}

/// Sleeps for real, used by the CLI binaries.
pub struct RealSleeper;

impl Sleeper for RealSleeper {
    fn sleep(&self, secs: f64) {
        if secs > 0.0 {
            std::thread::sleep(std::time::Duration::from_secs_f64(secs));
        }
    }
}

/// Tunables for one sweep run.
#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// The batch size the first transaction in each db starts with.
    pub initial_batch_size: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: 1000,
        }
    }
}

/// Per-db counts from a completed sweep.
#[derive(Debug, Default, Clone)]
pub struct SweepReport {
    pub deleted: BTreeMap<DbName, usize>,
    pub skipped: BTreeMap<DbName, usize>,
}

/// Drains `bad` into deletion transactions against `stores`.
///
/// For each db: begin a transaction, delete oids from `bad.iterator(db)`
/// one at a time, skipping `KeyMissing`/`Conflict` locally; once the
/// in-flight count reaches the current batch size, vote, finish, commit,
/// sleep `2 * batch_duration` as back-pressure, and shrink the batch size
/// to `max(10, batch_size * 0.5 / batch_duration)`. The final partial
/// batch is finished if it deleted anything, else aborted.
pub fn sweep(
    stores: &mut BTreeMap<DbName, Box<dyn Storage>>,
    bad: &mut BadIndex,
    config: &SweepConfig,
    clock: &dyn Clock,
    sleeper: &dyn Sleeper,
) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    for (db, storage) in stores.iter_mut() {
        let entries = bad.iterator(db)?;
        let (deleted, skipped) = sweep_db(
            db,
            storage.as_mut(),
            entries,
            config.initial_batch_size,
            clock,
            sleeper,
        )?;
        report.deleted.insert(db.clone(), deleted);
        report.skipped.insert(db.clone(), skipped);
    }
    Ok(report)
}

fn sweep_db(
    db: &str,
    storage: &mut dyn Storage,
    entries: Vec<(crate::oid::Oid, crate::oid::Tid)>,
    initial_batch_size: usize,
    clock: &dyn Clock,
    sleeper: &dyn Sleeper,
) -> Result<(usize, usize)> {
    let mut batch_size = initial_batch_size.max(1);
    let mut txn = storage.tpc_begin().map_err(GcError::Storage)?;
    let mut in_flight = 0usize;
    let mut batch_started_at = clock.now();
    let mut deleted = 0usize;
    let mut skipped = 0usize;

    for (oid, tid) in entries {
        match storage.delete_object(&mut txn, oid, tid) {
            Ok(()) => in_flight += 1,
            Err(StorageError::KeyMissing(_)) | Err(StorageError::Conflict(_)) => {
                skipped += 1;
                continue;
            }
            Err(e) => return Err(GcError::Storage(e)),
        }

        if in_flight >= batch_size {
            storage.tpc_vote(&mut txn).map_err(GcError::Storage)?;
            storage.tpc_finish(txn).map_err(GcError::Storage)?;
            deleted += in_flight;

            let duration = (clock.now() - batch_started_at).max(f64::MIN_POSITIVE);
            sleeper.sleep(2.0 * duration);
            batch_size = ((batch_size as f64 * 0.5 / duration).floor() as usize).max(10);

            txn = storage.tpc_begin().map_err(GcError::Storage)?;
            in_flight = 0;
            batch_started_at = clock.now();
        }
    }

    if in_flight > 0 {
        storage.tpc_vote(&mut txn).map_err(GcError::Storage)?;
        storage.tpc_finish(txn).map_err(GcError::Storage)?;
        deleted += in_flight;
    } else {
        storage.tpc_abort(txn).map_err(GcError::Storage)?;
    }

    tracing::debug!(db, deleted, skipped, "sweep drained db");
    Ok((deleted, skipped))
}
