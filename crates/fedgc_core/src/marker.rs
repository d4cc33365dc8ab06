//! The central two-pass mark algorithm (spec.md §4.4).

use crate::badindex::BadIndex;
use crate::error::{GcError, Result};
use crate::oid::{DbName, Oid, Tid};
use crate::oidset::OidSet;
use crate::refextractor::RefExtractor;
use crate::storage::Storage;
use std::collections::{BTreeMap, BTreeSet};

/// The three oid-label sets produced by a mark run.
pub struct MarkReport {
    /// Proven reachable: roots, post-cutoff writes, and their closure.
    pub good: OidSet,
    /// Candidate garbage, with outbound refs kept for resurrection.
    pub bad: BadIndex,
    /// Seen as a deletion record.
    pub deleted: OidSet,
}

/// Runs the mark phase over `stores`.
///
/// `cutoff` is the `ptid` boundary: `tid >= cutoff` is recent (live),
/// `tid < cutoff` is old (candidate). When `skip_recent_pass` is set
/// (`days == 0` in the CLI), pass A is not run at all and only roots seed
/// `good`.
///
/// Passes run federation-wide (every db's pass A, then every db's pass B)
/// rather than interleaved per db, per the correctness recommendation in
/// spec.md §9.
pub fn mark(
    stores: &BTreeMap<DbName, Box<dyn Storage>>,
    cutoff: Tid,
    ignore: &BTreeSet<DbName>,
    skip_recent_pass: bool,
) -> Result<MarkReport> {
    let mut good = OidSet::new();
    let mut deleted = OidSet::new();
    let mut bad = BadIndex::new()?;
    let extractor = RefExtractor::new(ignore);

    tracing::info!(dbs = stores.len(), "seeding roots");
    seed_roots(stores, &extractor, &mut good)?;

    if !skip_recent_pass {
        for (db, storage) in stores {
            tracing::info!(db, %cutoff, "pass A: scanning recent revisions");
            pass_recent(db, storage.as_ref(), cutoff, &extractor, &mut good, &mut deleted, &mut bad)?;
        }
    } else {
        tracing::info!("days=0: skipping pass A entirely");
    }

    for (db, storage) in stores {
        tracing::info!(db, %cutoff, "pass B: scanning old revisions");
        pass_old(db, storage.as_ref(), cutoff, &extractor, &mut good, &mut deleted, &mut bad)?;
    }

    tracing::info!(good = good.len(), deleted = deleted.len(), "mark complete");
    Ok(MarkReport { good, bad, deleted })
}

fn seed_roots(
    stores: &BTreeMap<DbName, Box<dyn Storage>>,
    extractor: &RefExtractor<'_>,
    good: &mut OidSet,
) -> Result<()> {
    for (db, storage) in stores {
        let (data, _tid) = storage
            .load(Oid::ROOT)
            .map_err(|source| GcError::RootUnreachable {
                db: db.clone(),
                source,
            })?;
        good.insert(db, Oid::ROOT);
        for (d, o) in extractor.extract(db, Oid::ROOT, &data)? {
            good.insert(&d, o);
        }
    }
    Ok(())
}

/// Pass A: recent (`tid >= cutoff`), forward order, for one db.
fn pass_recent(
    db: &str,
    storage: &dyn Storage,
    cutoff: Tid,
    extractor: &RefExtractor<'_>,
    good: &mut OidSet,
    deleted: &mut OidSet,
    bad: &mut BadIndex,
) -> Result<()> {
    for rec in storage.iterator(Some(cutoff), None)? {
        let rec = rec?;
        if rec.is_deletion() {
            deleted.insert(db, rec.oid);
            good.remove(db, rec.oid);
            continue;
        }
        if deleted.has(db, rec.oid) {
            return Err(GcError::InvariantViolation {
                db: db.to_string(),
                oid: rec.oid.as_hex(),
            });
        }
        good.insert(db, rec.oid);
        for (d, o) in extractor.extract(db, rec.oid, &rec.data)? {
            if !deleted.has(&d, o) {
                good.insert(&d, o);
                // Covers the per-db-interleaving case where this ref had
                // already been booked as candidate-garbage during a prior
                // pass B; a no-op under federation-wide pass ordering.
                bad.remove(&d, o);
            }
        }
    }
    Ok(())
}

/// Pass B: old (`tid < cutoff`), forward order, for one db.
fn pass_old(
    db: &str,
    storage: &dyn Storage,
    cutoff: Tid,
    extractor: &RefExtractor<'_>,
    good: &mut OidSet,
    deleted: &mut OidSet,
    bad: &mut BadIndex,
) -> Result<()> {
    for rec in storage.iterator(None, Some(cutoff))? {
        let rec = rec?;
        if rec.is_deletion() {
            deleted.insert(db, rec.oid);
            good.remove(db, rec.oid);
            bad.remove(db, rec.oid);
            continue;
        }
        if deleted.has(db, rec.oid) {
            continue;
        }
        if good.has(db, rec.oid) {
            let refs = extractor.extract(db, rec.oid, &rec.data)?;
            promote_and_cascade(refs, deleted, good, bad)?;
        } else {
            let refs = extractor.extract(db, rec.oid, &rec.data)?;
            let candidate_refs = refs
                .into_iter()
                .filter(|(d, o)| !good.has(d, *o) && !deleted.has(d, *o));
            bad.insert(db, rec.oid, rec.tid, candidate_refs)?;
        }
    }
    Ok(())
}

/// Inserts `refs` into `good`, and for each one that both newly became
/// good and was already candidate-garbage, promotes it: drains its bad
/// entry and repeats on the refs it was holding. An explicit worklist
/// rather than recursion bounds stack depth for arbitrarily deep graphs.
fn promote_and_cascade(
    refs: Vec<(DbName, Oid)>,
    deleted: &OidSet,
    good: &mut OidSet,
    bad: &mut BadIndex,
) -> Result<()> {
    let mut worklist: Vec<(DbName, Oid)> = Vec::new();
    for (d, o) in refs {
        if deleted.has(&d, o) {
            continue;
        }
        let newly_good = good.insert(&d, o);
        if newly_good && bad.has(&d, o) {
            worklist.push((d, o));
        }
    }
    while let Some((d, o)) = worklist.pop() {
        if let Some(drained_refs) = bad.pop(&d, o)? {
            for (d2, o2) in drained_refs {
                if deleted.has(&d2, o2) {
                    continue;
                }
                let newly_good = good.insert(&d2, o2);
                if newly_good && bad.has(&d2, o2) {
                    worklist.push((d2, o2));
                }
            }
        }
    }
    Ok(())
}
