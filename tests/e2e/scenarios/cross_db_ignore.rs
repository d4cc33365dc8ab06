//! Scenario 5 (spec.md §8): federation {A, B} with A referencing B;
//! ignoring B means nothing in A reaches it, so every object in B ends up
//! in the final bad set.

use fedgc_core::storage::{MemoryStorage, Storage};
use fedgc_core::{mark, DbName, Oid, RefStreamBuilder, Tid};
use std::collections::{BTreeMap, BTreeSet};

#[test]
fn ignored_db_is_entirely_bad() {
    let mut a = MemoryStorage::new(true);
    let mut b = MemoryStorage::new(true);
    let target = Oid::from_u64(5);

    b.commit(Oid::ROOT, RefStreamBuilder::new().build());
    b.commit(target, RefStreamBuilder::new().build());
    a.commit(Oid::ROOT, RefStreamBuilder::new().multi_db("b", target).build());

    let mut stores: BTreeMap<DbName, Box<dyn Storage>> = BTreeMap::new();
    stores.insert("a".to_string(), Box::new(a));
    stores.insert("b".to_string(), Box::new(b));

    let mut ignore = BTreeSet::new();
    ignore.insert("b".to_string());

    let cutoff = Tid::from_u64(1_000_000);
    let report = mark(&stores, cutoff, &ignore, false).unwrap();

    // B's own root is always live (every db seeds its own root regardless
    // of ignore), but nothing else in B is reachable once A's reference
    // into it is dropped.
    assert!(report.good.has("b", Oid::ROOT));
    assert!(!report.good.has("b", target));
    assert!(report.bad.has("b", target));
}
