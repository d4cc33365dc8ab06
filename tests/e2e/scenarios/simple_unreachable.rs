//! Scenario 1 (spec.md §8): a single orphaned object is marked bad, swept,
//! and a second GC run over the now-quiescent federation deletes nothing.

use fedgc_core::storage::{MemoryStorage, Storage};
use fedgc_core::{mark, sweep, DbName, Oid, RealSleeper, RefStreamBuilder, SweepConfig, Tid, WallClock};
use std::collections::{BTreeMap, BTreeSet};

#[test]
fn orphan_is_swept_and_second_run_is_idempotent() {
    let mut store = MemoryStorage::new(true);
    let m = Oid::from_u64(42);

    store.commit(Oid::ROOT, RefStreamBuilder::new().build());
    store.commit(Oid::ROOT, RefStreamBuilder::new().bare_oid(m).build()); // root.a = M
    store.commit(m, RefStreamBuilder::new().build());
    store.commit(Oid::ROOT, RefStreamBuilder::new().build()); // del root.a: M orphaned

    let cutoff = Tid::from_u64(store.head().unwrap().as_u64() + 1);
    store.commit(Oid::ROOT, RefStreamBuilder::new().build()); // root.x = 1, post-cutoff

    assert!(store.load(m).is_ok());

    let mut stores: BTreeMap<DbName, Box<dyn Storage>> = BTreeMap::new();
    stores.insert(String::new(), Box::new(store));

    let report = mark(&stores, cutoff, &BTreeSet::new(), false).unwrap();
    assert!(report.bad.has("", m));
    assert!(!report.good.has("", m));
    assert!(!report.deleted.has("", m));

    let mut bad = report.bad;
    let swept = sweep(&mut stores, &mut bad, &SweepConfig::default(), &WallClock, &RealSleeper).unwrap();
    assert_eq!(swept.deleted[""], 1);
    assert!(stores[""].load(m).is_err());

    // Re-running GC over the now-quiescent federation with the same cutoff
    // finds nothing left to delete.
    let report2 = mark(&stores, cutoff, &BTreeSet::new(), false).unwrap();
    assert!(!report2.bad.has("", m));
    let mut bad2 = report2.bad;
    let swept2 = sweep(&mut stores, &mut bad2, &SweepConfig::default(), &WallClock, &RealSleeper).unwrap();
    assert_eq!(swept2.deleted[""], 0);
}
