//! fedgc_core
//!
//! Distributed garbage collection and reference checking for a federation
//! of persistent object stores: mark-and-sweep over historical transaction
//! logs, plus a live reachability checker, against a storage collaborator
//! trait the host database implements.
//!
//! # Quick start
//!
//! ```
//! use fedgc_core::{Oid, Tid};
//! use fedgc_core::storage::{MemoryStorage, Storage};
//! use fedgc_core::refextractor::RefStreamBuilder;
//! use fedgc_core::marker::mark;
//! use std::collections::{BTreeMap, BTreeSet};
//!
//! let mut store = MemoryStorage::new(true);
//! store.commit(Oid::ROOT, RefStreamBuilder::new().build());
//!
//! let mut stores: BTreeMap<String, Box<dyn Storage>> = BTreeMap::new();
//! stores.insert(String::new(), Box::new(store));
//!
//! let report = mark(&stores, Tid::from_u64(0), &BTreeSet::new(), false).unwrap();
//! assert!(report.good.has("", Oid::ROOT));
//! ```

pub mod badindex;
pub mod checker;
pub mod config;
pub mod error;
pub mod federation;
pub mod marker;
pub mod oid;
pub mod oidset;
pub mod refextractor;
pub mod storage;
pub mod sweeper;
pub mod untransform;

pub use badindex::{BadIndex, BadRef};
pub use checker::{check, BackRefIndex, BackRefs, CheckReport, CollectingReporter, Reporter, StdoutReporter};
pub use config::{DbConfig, FederationConfig, StorageConfig};
pub use error::{GcError, Result, StorageError};
pub use federation::{open_matched_pair, Federation};
pub use marker::{mark, MarkReport};
pub use oid::{DbName, Oid, Tid};
pub use oidset::OidSet;
pub use refextractor::{RefExtractor, RefStreamBuilder};
pub use sweeper::{sweep, Clock, RealSleeper, Sleeper, SweepConfig, SweepReport, WallClock};
