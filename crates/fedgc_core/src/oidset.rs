//! Compact membership set of `(db, oid)` pairs (spec.md §4.2).

use crate::oid::{DbName, Oid};
use std::collections::{BTreeMap, BTreeSet};

/// A set of `(db, oid)` pairs, represented per-db as a two-level map
/// `oid[:6] -> ordered set of oid[6:]`.
///
/// The split exploits the fact that the top 48 bits of sequentially
/// allocated oids have low cardinality: most prefix buckets hold many
/// suffixes, keeping fan-out shallow and per-oid overhead near the
/// theoretical minimum of a sorted 2-byte key.
#[derive(Debug, Default, Clone)]
pub struct OidSet {
    dbs: BTreeMap<DbName, BTreeMap<[u8; 6], BTreeSet<[u8; 2]>>>,
}

impl OidSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `(db, oid)`, returning whether membership actually changed.
    pub fn insert(&mut self, db: &str, oid: Oid) -> bool {
        let bucket = self
            .dbs
            .entry(db.to_string())
            .or_default()
            .entry(oid.prefix())
            .or_default();
        bucket.insert(oid.suffix())
    }

    /// Removes `(db, oid)`, returning whether it was present.
    pub fn remove(&mut self, db: &str, oid: Oid) -> bool {
        let Some(prefixes) = self.dbs.get_mut(db) else {
            return false;
        };
        let Some(bucket) = prefixes.get_mut(&oid.prefix()) else {
            return false;
        };
        let removed = bucket.remove(&oid.suffix());
        if bucket.is_empty() {
            prefixes.remove(&oid.prefix());
        }
        if prefixes.is_empty() {
            self.dbs.remove(db);
        }
        removed
    }

    /// Tests membership of `(db, oid)`.
    pub fn has(&self, db: &str, oid: Oid) -> bool {
        self.dbs
            .get(db)
            .and_then(|prefixes| prefixes.get(&oid.prefix()))
            .is_some_and(|bucket| bucket.contains(&oid.suffix()))
    }

    /// Removes and returns some `(db, oid)` pair, or `None` if empty.
    ///
    /// Selection order (some non-empty db, its first prefix bucket, the
    /// bucket's maximum suffix) is deterministic given the current state
    /// but otherwise unspecified; callers must not depend on it.
    pub fn pop(&mut self) -> Option<(DbName, Oid)> {
        let db = self.dbs.keys().next()?.clone();
        let prefixes = self.dbs.get_mut(&db)?;
        let (&prefix, bucket) = prefixes.iter_mut().next()?;
        let suffix = *bucket.iter().next_back()?;
        bucket.remove(&suffix);
        if bucket.is_empty() {
            prefixes.remove(&prefix);
        }
        if prefixes.is_empty() {
            self.dbs.remove(&db);
        }
        Some((db, Oid::from_prefix_suffix(prefix, suffix)))
    }

    /// Iterates every `(db, oid)` pair in the set.
    pub fn iterator(&self) -> impl Iterator<Item = (&str, Oid)> + '_ {
        self.dbs.iter().flat_map(|(db, prefixes)| {
            prefixes.iter().flat_map(move |(&prefix, bucket)| {
                bucket
                    .iter()
                    .map(move |&suffix| (db.as_str(), Oid::from_prefix_suffix(prefix, suffix)))
            })
        })
    }

    /// Iterates the oids stored under a single db.
    pub fn iterator_for_db<'a>(&'a self, db: &str) -> Box<dyn Iterator<Item = Oid> + 'a> {
        match self.dbs.get(db) {
            Some(prefixes) => Box::new(prefixes.iter().flat_map(|(&prefix, bucket)| {
                bucket
                    .iter()
                    .map(move |&suffix| Oid::from_prefix_suffix(prefix, suffix))
            })),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Whether the set holds no pairs at all.
    pub fn is_empty(&self) -> bool {
        self.dbs.is_empty()
    }

    /// Total number of `(db, oid)` pairs in the set.
    pub fn len(&self) -> usize {
        self.dbs
            .values()
            .flat_map(|prefixes| prefixes.values())
            .map(BTreeSet::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_whether_membership_changed() {
        let mut set = OidSet::new();
        assert!(set.insert("a", Oid::from_u64(1)));
        assert!(!set.insert("a", Oid::from_u64(1)));
    }

    #[test]
    fn remove_then_has_is_false() {
        let mut set = OidSet::new();
        set.insert("a", Oid::from_u64(1));
        assert!(set.remove("a", Oid::from_u64(1)));
        assert!(!set.has("a", Oid::from_u64(1)));
    }

    #[test]
    fn distinct_dbs_do_not_collide() {
        let mut set = OidSet::new();
        set.insert("a", Oid::from_u64(1));
        assert!(!set.has("b", Oid::from_u64(1)));
    }

    #[test]
    fn pop_drains_the_set() {
        let mut set = OidSet::new();
        set.insert("a", Oid::from_u64(1));
        set.insert("a", Oid::from_u64(2));
        set.insert("b", Oid::from_u64(3));
        let mut popped = Vec::new();
        while let Some(pair) = set.pop() {
            popped.push(pair);
        }
        assert_eq!(popped.len(), 3);
        assert!(set.is_empty());
    }

    #[test]
    fn iterator_for_db_only_yields_that_db() {
        let mut set = OidSet::new();
        set.insert("a", Oid::from_u64(1));
        set.insert("b", Oid::from_u64(2));
        let a_oids: Vec<_> = set.iterator_for_db("a").collect();
        assert_eq!(a_oids, vec![Oid::from_u64(1)]);
    }

    #[test]
    fn len_counts_all_pairs() {
        let mut set = OidSet::new();
        set.insert("a", Oid::from_u64(1));
        set.insert("a", Oid::from_u64(2));
        set.insert("b", Oid::from_u64(1));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn oids_sharing_a_prefix_bucket_together() {
        let mut set = OidSet::new();
        // same top 6 bytes, differing only in the low 2 bytes.
        let a = Oid::from_u64(0x0001_0203_0405_0000);
        let b = Oid::from_u64(0x0001_0203_0405_0001);
        set.insert("x", a);
        set.insert("x", b);
        assert!(set.has("x", a));
        assert!(set.has("x", b));
        assert_eq!(set.len(), 2);
    }
}
