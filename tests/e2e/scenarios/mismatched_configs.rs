//! Scenario 4 (spec.md §8): two configurations naming different db sets
//! are rejected before any storage iterator is opened.

use fedgc_core::{open_matched_pair, DbConfig, FederationConfig, GcError, StorageConfig};

fn config(names: &[&str]) -> FederationConfig {
    let mut cfg = FederationConfig::default();
    for name in names {
        cfg.databases.insert(
            name.to_string(),
            DbConfig {
                storage: StorageConfig::Memory,
                xrefs: true,
            },
        );
    }
    cfg
}

#[test]
fn mismatched_db_sets_are_fatal_before_any_work() {
    let primary = config(&["a", "b"]);
    let secondary = config(&["a", "c"]);

    let err = open_matched_pair(&primary, Some(&secondary)).unwrap_err();
    match err {
        GcError::MismatchedFederations { primary, secondary } => {
            assert_eq!(primary, vec!["a".to_string(), "b".to_string()]);
            assert_eq!(secondary, vec!["a".to_string(), "c".to_string()]);
        }
        other => panic!("expected MismatchedFederations, got {other:?}"),
    }
}

#[test]
fn matching_db_sets_open_cleanly() {
    let primary = config(&["a", "b"]);
    let secondary = config(&["a", "b"]);
    assert!(open_matched_pair(&primary, Some(&secondary)).is_ok());
}
