//! Reference extraction from a single object record (spec.md §4.1).
//!
//! The real pickle format is explicitly out of scope (spec.md §1): this
//! module is specified against **REC1**, a concrete, self-contained
//! tagged-entry encoding that stands in for "the harvested output of the
//! two `noload()` passes over a pickle stream." Every reference kind in
//! spec.md §3's table has a REC1 tag; [`RefStreamBuilder`] builds REC1
//! payloads for tests the way "pickling a graph `G`" does for the original
//! format.
//!
//! Tags:
//!
//! | Tag | Shape | Effect |
//! |---|---|---|
//! | `0x00` | filler | none; lets a live record with zero refs stay non-empty |
//! | `0x01` | bare oid | strong ref `(rname, oid)` |
//! | `0x02` | tuple `(oid, class)` | strong ref `(rname, oid)` |
//! | `0x03` | legacy weak `[oid]` | skipped |
//! | `0x04` | multi-db `['n'\|'m', (oid, db, ...)]` | strong ref `(db, oid)` unless `db` is ignored |
//! | `0x05` | weak `['w', ...]` | skipped |
//! | `0x06` | explicit unknown shape | fatal: [`GcError::CorruptRecord`] |
//! | `0x07` | explicit empty list | fatal: [`GcError::CorruptRecord`] |
//! | other | — | fatal: [`GcError::CorruptRecord`] |

use crate::error::{GcError, Result};
use crate::oid::{DbName, Oid};
use std::collections::BTreeSet;

const TAG_FILLER: u8 = 0x00;
const TAG_BARE_OID: u8 = 0x01;
const TAG_TUPLE: u8 = 0x02;
const TAG_LEGACY_WEAK: u8 = 0x03;
const TAG_MULTI_DB: u8 = 0x04;
const TAG_WEAK_LIST: u8 = 0x05;
const TAG_UNKNOWN_SHAPE: u8 = 0x06;
const TAG_EMPTY_LIST: u8 = 0x07;

/// Extracts strong outbound `(db, oid)` references from a single record's
/// REC1 payload.
///
/// Never calls back into storage; a record's strong outbound graph is
/// fully determined by its reference payload.
pub struct RefExtractor<'a> {
    ignore: &'a BTreeSet<DbName>,
}

impl<'a> RefExtractor<'a> {
    /// Creates an extractor that drops references into any db in `ignore`.
    pub fn new(ignore: &'a BTreeSet<DbName>) -> Self {
        Self { ignore }
    }

    /// Extracts references from `data`, a record belonging to `rname`, for
    /// diagnostics identified by `oid`.
    pub fn extract(&self, rname: &str, oid: Oid, data: &[u8]) -> Result<Vec<(DbName, Oid)>> {
        let mut refs = Vec::new();
        let mut pos = 0usize;
        while pos < data.len() {
            let tag = data[pos];
            pos += 1;
            match tag {
                TAG_FILLER => {}
                TAG_BARE_OID | TAG_TUPLE => {
                    let target = read_oid(rname, oid, data, &mut pos)?;
                    refs.push((rname.to_string(), target));
                }
                TAG_LEGACY_WEAK => {
                    read_oid(rname, oid, data, &mut pos)?;
                }
                TAG_MULTI_DB => {
                    let db = read_name(rname, oid, data, &mut pos)?;
                    let target = read_oid(rname, oid, data, &mut pos)?;
                    if !self.ignore.contains(&db) {
                        refs.push((db, target));
                    }
                }
                TAG_WEAK_LIST => {
                    read_name(rname, oid, data, &mut pos)?;
                }
                TAG_UNKNOWN_SHAPE => {
                    return Err(corrupt(rname, oid, "unrecognized reference shape"));
                }
                TAG_EMPTY_LIST => {
                    return Err(corrupt(rname, oid, "empty persistent-ref list"));
                }
                other => {
                    return Err(corrupt(rname, oid, &format!("unknown tag 0x{other:02x}")));
                }
            }
        }
        Ok(refs)
    }
}

fn corrupt(db: &str, oid: Oid, reason: &str) -> GcError {
    GcError::CorruptRecord {
        db: db.to_string(),
        oid: oid.as_hex(),
        reason: reason.to_string(),
    }
}

fn read_oid(db: &str, record_oid: Oid, data: &[u8], pos: &mut usize) -> Result<Oid> {
    let end = *pos + 8;
    let bytes: [u8; 8] = data
        .get(*pos..end)
        .ok_or_else(|| corrupt(db, record_oid, "truncated oid"))?
        .try_into()
        .unwrap();
    *pos = end;
    Ok(Oid::from_bytes(bytes))
}

fn read_name(db: &str, record_oid: Oid, data: &[u8], pos: &mut usize) -> Result<String> {
    let len = *data
        .get(*pos)
        .ok_or_else(|| corrupt(db, record_oid, "truncated name length"))? as usize;
    *pos += 1;
    let end = *pos + len;
    let bytes = data
        .get(*pos..end)
        .ok_or_else(|| corrupt(db, record_oid, "truncated name"))?;
    *pos = end;
    String::from_utf8(bytes.to_vec()).map_err(|_| corrupt(db, record_oid, "non-utf8 db name"))
}

/// Builds REC1 payloads for tests, analogous to pickling a reference graph.
#[derive(Debug, Default, Clone)]
pub struct RefStreamBuilder {
    buf: Vec<u8>,
}

impl RefStreamBuilder {
    /// Starts a new, empty stream.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Appends a bare-oid strong reference.
    pub fn bare_oid(mut self, oid: Oid) -> Self {
        self.buf.push(TAG_BARE_OID);
        self.buf.extend_from_slice(oid.as_bytes());
        self
    }

    /// Appends a `(oid, class)` tuple strong reference.
    pub fn tuple(mut self, oid: Oid) -> Self {
        self.buf.push(TAG_TUPLE);
        self.buf.extend_from_slice(oid.as_bytes());
        self
    }

    /// Appends a legacy single-element weak-list reference (skipped).
    pub fn legacy_weak(mut self, oid: Oid) -> Self {
        self.buf.push(TAG_LEGACY_WEAK);
        self.buf.extend_from_slice(oid.as_bytes());
        self
    }

    /// Appends a multi-db (`n`/`m`) strong reference.
    pub fn multi_db(mut self, db: &str, oid: Oid) -> Self {
        self.buf.push(TAG_MULTI_DB);
        self.buf.push(db.len() as u8);
        self.buf.extend_from_slice(db.as_bytes());
        self.buf.extend_from_slice(oid.as_bytes());
        self
    }

    /// Appends a weak (`w`) reference (skipped).
    pub fn weak(mut self, payload: &str) -> Self {
        self.buf.push(TAG_WEAK_LIST);
        self.buf.push(payload.len() as u8);
        self.buf.extend_from_slice(payload.as_bytes());
        self
    }

    /// Appends an explicit unrecognized-shape marker, for corruption tests.
    pub fn unknown_shape(mut self) -> Self {
        self.buf.push(TAG_UNKNOWN_SHAPE);
        self
    }

    /// Appends an explicit empty-list marker, for corruption tests.
    pub fn empty_list(mut self) -> Self {
        self.buf.push(TAG_EMPTY_LIST);
        self
    }

    /// Finishes the stream, guaranteeing it is non-empty (so it is never
    /// confused with a deletion record) even when no references were added.
    pub fn build(mut self) -> Vec<u8> {
        if self.buf.is_empty() {
            self.buf.push(TAG_FILLER);
        }
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(ignore: &BTreeSet<DbName>) -> RefExtractor<'_> {
        RefExtractor::new(ignore)
    }

    #[test]
    fn bare_oid_and_tuple_are_strong() {
        let ignore = BTreeSet::new();
        let data = RefStreamBuilder::new()
            .bare_oid(Oid::from_u64(1))
            .tuple(Oid::from_u64(2))
            .build();
        let refs = extractor(&ignore)
            .extract("db", Oid::ROOT, &data)
            .unwrap();
        assert_eq!(
            refs,
            vec![
                ("db".to_string(), Oid::from_u64(1)),
                ("db".to_string(), Oid::from_u64(2))
            ]
        );
    }

    #[test]
    fn legacy_weak_and_weak_list_are_skipped() {
        let ignore = BTreeSet::new();
        let data = RefStreamBuilder::new()
            .legacy_weak(Oid::from_u64(1))
            .weak("ignored")
            .build();
        let refs = extractor(&ignore)
            .extract("db", Oid::ROOT, &data)
            .unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn multi_db_ref_respects_ignore_set() {
        let mut ignore = BTreeSet::new();
        ignore.insert("other".to_string());
        let data = RefStreamBuilder::new()
            .multi_db("other", Oid::from_u64(1))
            .multi_db("kept", Oid::from_u64(2))
            .build();
        let refs = extractor(&ignore)
            .extract("db", Oid::ROOT, &data)
            .unwrap();
        assert_eq!(refs, vec![("kept".to_string(), Oid::from_u64(2))]);
    }

    #[test]
    fn unknown_shape_is_corrupt_record() {
        let ignore = BTreeSet::new();
        let data = RefStreamBuilder::new().unknown_shape().build();
        let err = extractor(&ignore).extract("db", Oid::ROOT, &data).unwrap_err();
        assert!(matches!(err, GcError::CorruptRecord { .. }));
    }

    #[test]
    fn empty_list_is_corrupt_record() {
        let ignore = BTreeSet::new();
        let data = RefStreamBuilder::new().empty_list().build();
        let err = extractor(&ignore).extract("db", Oid::ROOT, &data).unwrap_err();
        assert!(matches!(err, GcError::CorruptRecord { .. }));
    }

    #[test]
    fn empty_builder_still_yields_non_empty_bytes() {
        let data = RefStreamBuilder::new().build();
        assert_eq!(data, vec![TAG_FILLER]);
        let refs = extractor(&BTreeSet::new())
            .extract("db", Oid::ROOT, &data)
            .unwrap();
        assert!(refs.is_empty());
    }
}
