//! Scenario 3 (spec.md §8): records stored on disk with a `.h` prefix and a
//! hex-encoded REC1 body must mark identically to the plain-REC1 control,
//! once the storage is wrapped with the `hex` untransform.

use fedgc_cli::UntransformingStorage;
use fedgc_core::storage::{FileStorage, Storage};
use fedgc_core::untransform::lookup;
use fedgc_core::{mark, DbName, Oid, RefStreamBuilder, Tid};
use std::collections::{BTreeMap, BTreeSet};
use tempfile::TempDir;

fn wrap_hex(payload: &[u8]) -> Vec<u8> {
    let mut out = b".h".to_vec();
    out.extend(hex::encode(payload).into_bytes());
    out
}

#[test]
fn hex_transformed_records_mark_the_same_as_plain_ones() {
    let m = Oid::from_u64(1);
    let n = Oid::from_u64(2);
    let orphan = Oid::from_u64(3);

    let plain_tmp = TempDir::new().unwrap();
    let mut plain = FileStorage::open(plain_tmp.path(), true).unwrap();
    plain.commit(Oid::ROOT, RefStreamBuilder::new().bare_oid(m).build()).unwrap();
    plain.commit(m, RefStreamBuilder::new().bare_oid(n).build()).unwrap();
    plain.commit(n, RefStreamBuilder::new().build()).unwrap();
    plain.commit(orphan, RefStreamBuilder::new().build()).unwrap();

    let hex_tmp = TempDir::new().unwrap();
    let mut hexed = FileStorage::open(hex_tmp.path(), true).unwrap();
    hexed
        .commit(Oid::ROOT, wrap_hex(&RefStreamBuilder::new().bare_oid(m).build()))
        .unwrap();
    hexed
        .commit(m, wrap_hex(&RefStreamBuilder::new().bare_oid(n).build()))
        .unwrap();
    hexed.commit(n, wrap_hex(&RefStreamBuilder::new().build())).unwrap();
    hexed.commit(orphan, wrap_hex(&RefStreamBuilder::new().build())).unwrap();

    // Both logs commit the same four records in the same order, so both
    // assign tids 0..=3; a cutoff of 4 puts every commit in pass B.
    let cutoff = Tid::from_u64(4);

    let mut plain_stores: BTreeMap<DbName, Box<dyn Storage>> = BTreeMap::new();
    plain_stores.insert(String::new(), Box::new(plain));
    let control = mark(&plain_stores, cutoff, &BTreeSet::new(), false).unwrap();

    let untransform = lookup("hex").unwrap();
    let wrapped = UntransformingStorage::new(Box::new(hexed), untransform);
    let mut hex_stores: BTreeMap<DbName, Box<dyn Storage>> = BTreeMap::new();
    hex_stores.insert(String::new(), Box::new(wrapped));
    let under_test = mark(&hex_stores, cutoff, &BTreeSet::new(), false).unwrap();

    assert!(control.bad.has("", orphan));
    assert!(under_test.bad.has("", orphan));
    assert!(control.good.has("", m) && under_test.good.has("", m));
    assert!(control.good.has("", n) && under_test.good.has("", n));
    assert_eq!(control.bad.len(), under_test.bad.len());
}
