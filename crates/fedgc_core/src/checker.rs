//! Forward reachability checker (spec.md §4.6).

use crate::error::{GcError, Result};
use crate::oid::{DbName, Oid};
use crate::oidset::OidSet;
use crate::refextractor::RefExtractor;
use crate::storage::Storage;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A referrer identifying who enqueued an oid, for diagnostics.
pub type Referrer = (DbName, Oid);

/// Per-referent back-reference set: a plain set while every referrer shares
/// the referent's own db, promoted to a map-of-sets on the first
/// cross-db referrer (spec.md §9's tagged-variant redesign).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum BackRefs {
    Local(BTreeSet<Oid>),
    CrossDb(BTreeMap<DbName, BTreeSet<Oid>>),
}

impl BackRefs {
    fn record(&mut self, own_db: &str, referrer_db: &str, referrer_oid: Oid) {
        match self {
            BackRefs::Local(set) => {
                if referrer_db == own_db {
                    set.insert(referrer_oid);
                    return;
                }
                let mut map: BTreeMap<DbName, BTreeSet<Oid>> = BTreeMap::new();
                map.insert(own_db.to_string(), std::mem::take(set));
                map.entry(referrer_db.to_string())
                    .or_default()
                    .insert(referrer_oid);
                *self = BackRefs::CrossDb(map);
            }
            BackRefs::CrossDb(map) => {
                map.entry(referrer_db.to_string())
                    .or_default()
                    .insert(referrer_oid);
            }
        }
    }
}

/// `db -> oid -> BackRefs`, built up over the course of one check run.
#[derive(Debug, Default, Clone)]
pub struct BackRefIndex {
    entries: BTreeMap<DbName, BTreeMap<Oid, BackRefs>>,
}

impl BackRefIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `(referrer_db, referrer_oid)` points at
    /// `(target_db, target_oid)`.
    pub fn insert(&mut self, target_db: &str, target_oid: Oid, referrer_db: &str, referrer_oid: Oid) {
        let per_db = self.entries.entry(target_db.to_string()).or_default();
        per_db
            .entry(target_oid)
            .or_insert_with(|| BackRefs::Local(BTreeSet::new()))
            .record(target_db, referrer_db, referrer_oid);
    }

    pub fn get(&self, db: &str, oid: Oid) -> Option<&BackRefs> {
        self.entries.get(db).and_then(|m| m.get(&oid))
    }

    /// Number of (target_db, target_oid) entries recorded.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Iterates every `(target_db, target_oid, BackRefs)` entry recorded,
    /// used by the CLI to persist this index to disk.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Oid, &BackRefs)> {
        self.entries.iter().flat_map(|(db, oids)| {
            oids.iter().map(move |(&oid, refs)| (db.as_str(), oid, refs))
        })
    }
}

/// Sink for the Checker's diagnostic lines, the Rust expression of "a
/// single injected logger sink" (spec.md §9).
///
/// Default format matches spec.md §6's literal line shapes:
/// `!!! <db> <oid> <rdb> <roid>|? <ErrorKind>: <message>`.
pub trait Reporter {
    fn load_failure(&self, db: &str, oid: Oid, referrer: Option<Referrer>, message: &str);
    fn bad_cross_ref(&self, db: &str, oid: Oid, referrer: Option<Referrer>, target_db: &str);
    fn unknown_database(&self, db: &str, oid: Oid, referrer: Option<Referrer>, target_db: &str);
}

fn referrer_repr(referrer: &Option<Referrer>) -> String {
    match referrer {
        Some((rdb, roid)) => format!("{rdb} {roid}"),
        None => "?".to_string(),
    }
}

/// Prints diagnostics to stdout, the CLI's default.
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn load_failure(&self, db: &str, oid: Oid, referrer: Option<Referrer>, message: &str) {
        println!(
            "!!! {db} {oid} {} LoadError: {message}",
            referrer_repr(&referrer)
        );
    }

    fn bad_cross_ref(&self, db: &str, oid: Oid, referrer: Option<Referrer>, target_db: &str) {
        println!(
            "!!! {db} {oid} {} BadCrossRef: bad xref {db}->{target_db}",
            referrer_repr(&referrer)
        );
    }

    fn unknown_database(&self, db: &str, oid: Oid, referrer: Option<Referrer>, target_db: &str) {
        println!(
            "!!! {db} {oid} {} UnknownDatabase: bad db {target_db}",
            referrer_repr(&referrer)
        );
    }
}

/// Collects diagnostics in memory, used by tests in place of stdout.
#[derive(Default)]
pub struct CollectingReporter {
    pub lines: std::sync::Mutex<Vec<String>>,
}

impl Reporter for CollectingReporter {
    fn load_failure(&self, db: &str, oid: Oid, referrer: Option<Referrer>, message: &str) {
        self.lines.lock().unwrap().push(format!(
            "!!! {db} {oid} {} LoadError: {message}",
            referrer_repr(&referrer)
        ));
    }

    fn bad_cross_ref(&self, db: &str, oid: Oid, referrer: Option<Referrer>, target_db: &str) {
        self.lines.lock().unwrap().push(format!(
            "!!! {db} {oid} {} BadCrossRef: bad xref {db}->{target_db}",
            referrer_repr(&referrer)
        ));
    }

    fn unknown_database(&self, db: &str, oid: Oid, referrer: Option<Referrer>, target_db: &str) {
        self.lines.lock().unwrap().push(format!(
            "!!! {db} {oid} {} UnknownDatabase: bad db {target_db}",
            referrer_repr(&referrer)
        ));
    }
}

/// Heuristic blob-record marker used by the stand-in REC1 payload format;
/// a direct format tag would replace this if the storage surface exposed
/// one (spec.md §9).
const BLOB_MARKER: &[u8] = b"BLOB1";

fn looks_like_blob_record(data: &[u8]) -> bool {
    data.len() < 100 && data.windows(BLOB_MARKER.len()).any(|w| w == BLOB_MARKER)
}

/// Summary of one check run.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub visited: usize,
    pub load_failures: usize,
    pub bad_cross_refs: usize,
    pub unknown_databases: usize,
    pub back_refs: BackRefIndex,
}

/// Runs a forward BFS from every db's root, reporting load failures and
/// cross-database reference policy violations through `reporter`.
pub fn check(
    stores: &BTreeMap<DbName, Box<dyn Storage>>,
    ignore: &BTreeSet<DbName>,
    reporter: &dyn Reporter,
) -> Result<CheckReport> {
    let extractor = RefExtractor::new(ignore);
    let mut seen = OidSet::new();
    let mut queue: VecDeque<(DbName, Oid, Option<Referrer>)> = VecDeque::new();
    let mut report = CheckReport::default();

    for db in stores.keys() {
        queue.push_back((db.clone(), Oid::ROOT, None));
    }

    while let Some((db, oid, referrer)) = queue.pop_front() {
        if seen.has(&db, oid) {
            continue;
        }
        seen.insert(&db, oid);
        report.visited += 1;

        let storage = stores
            .get(&db)
            .ok_or_else(|| GcError::Config(format!("unknown database in worklist: {db}")))?;

        let (data, tid) = match storage.load(oid) {
            Ok(v) => v,
            Err(e) => {
                report.load_failures += 1;
                reporter.load_failure(&db, oid, referrer, &e.to_string());
                continue;
            }
        };

        if looks_like_blob_record(&data) {
            if let Err(e) = storage.load_blob(oid, tid) {
                report.load_failures += 1;
                reporter.load_failure(&db, oid, referrer.clone(), &e.to_string());
                continue;
            }
        }

        let refs = extractor.extract(&db, oid, &data)?;
        for (rdb, roid) in refs {
            if rdb != db && !storage.allows_xrefs() {
                report.bad_cross_refs += 1;
                reporter.bad_cross_ref(&db, oid, Some((db.clone(), oid)), &rdb);
            }
            if !stores.contains_key(&rdb) {
                report.unknown_databases += 1;
                reporter.unknown_database(&db, oid, Some((db.clone(), oid)), &rdb);
                continue;
            }
            report.back_refs.insert(&rdb, roid, &db, oid);
            if !seen.has(&rdb, roid) {
                queue.push_back((rdb.clone(), roid, Some((db.clone(), oid))));
            }
        }
    }

    Ok(report)
}

/// Persisting [`BackRefIndex`] to a `redb` database, with a commit every
/// `BACK_REF_COMMIT_INTERVAL` inserts to bound memory (spec.md §4.6), is
/// the CLI layer's responsibility — it owns the file path the `-r PATH`
/// flag names, not the core algorithm.
pub const BACK_REF_COMMIT_INTERVAL: usize = 400;
