//! Scenario 2 (spec.md §8): a pre-cutoff revision references Y, a later
//! pre-cutoff revision drops the reference, and a post-cutoff revision
//! references Y again. Y must end up good.

use fedgc_core::storage::{MemoryStorage, Storage};
use fedgc_core::{mark, DbName, Oid, RefStreamBuilder, Tid};
use std::collections::{BTreeMap, BTreeSet};

#[test]
fn resurrected_reference_keeps_target_good() {
    let mut store = MemoryStorage::new(true);
    let x = Oid::from_u64(1);
    let y = Oid::from_u64(2);

    store.commit(Oid::ROOT, RefStreamBuilder::new().build());
    store.commit(y, RefStreamBuilder::new().build());
    store.commit(x, RefStreamBuilder::new().bare_oid(y).build()); // R1: X -> Y
    store.commit(x, RefStreamBuilder::new().build()); // R2: X no longer -> Y

    let cutoff = Tid::from_u64(store.head().unwrap().as_u64() + 1);

    store.commit(x, RefStreamBuilder::new().bare_oid(y).build()); // R3: X -> Y again
    store.commit(Oid::ROOT, RefStreamBuilder::new().bare_oid(x).build());

    let mut stores: BTreeMap<DbName, Box<dyn Storage>> = BTreeMap::new();
    stores.insert(String::new(), Box::new(store));

    let report = mark(&stores, cutoff, &BTreeSet::new(), false).unwrap();
    assert!(report.good.has("", y));
    assert!(!report.bad.has("", y));
}
