//! Spill-to-disk map `(db, oid) -> (tid, refs)` for candidate-garbage
//! objects (spec.md §4.3).

use crate::oid::{DbName, Oid, Tid};
use std::collections::{BTreeSet, HashMap};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A ref observed on a bad entry's most recent non-deleted revision.
pub type BadRef = (DbName, Oid);

/// Candidate-garbage index, backed by a single scratch file.
///
/// Per-db, an in-memory map from oid to a byte offset into the scratch
/// file; at that offset, a fixed 8-byte tid followed by a length-prefixed
/// vector of refs. A tid-only update rewrites those 8 bytes in place; a
/// change to the ref set appends a new payload and retargets the index
/// entry, leaving the old bytes as unreachable slack in the file.
///
/// No emptiness test is exposed on purpose (spec.md §9): callers must
/// decide termination by record exhaustion, never by testing this index
/// for truthiness.
pub struct BadIndex {
    scratch: tempfile::NamedTempFile,
    index: HashMap<DbName, HashMap<Oid, u64>>,
}

impl BadIndex {
    /// Creates an empty index backed by a fresh scratch file in `dir`
    /// (the system temp directory if `None`).
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            scratch: tempfile::NamedTempFile::new()?,
            index: HashMap::new(),
        })
    }

    /// Inserts `refs` for `(db, oid)`, unioning them into any existing
    /// entry and keeping the maximum tid. Idempotent when the union is
    /// unchanged.
    pub fn insert(
        &mut self,
        db: &str,
        oid: Oid,
        tid: Tid,
        refs: impl IntoIterator<Item = BadRef>,
    ) -> io::Result<()> {
        let new_refs: BTreeSet<BadRef> = refs.into_iter().collect();
        if let Some(&offset) = self.index.get(db).and_then(|m| m.get(&oid)) {
            let (existing_tid, existing_refs) = self.read_entry(offset)?;
            let merged_tid = existing_tid.max(tid);
            if existing_refs == new_refs {
                if merged_tid != existing_tid {
                    self.rewrite_tid(offset, merged_tid)?;
                }
                return Ok(());
            }
            let union: BTreeSet<BadRef> = existing_refs.union(&new_refs).cloned().collect();
            let new_offset = self.append_entry(merged_tid, &union)?;
            self.index
                .entry(db.to_string())
                .or_default()
                .insert(oid, new_offset);
            return Ok(());
        }
        let offset = self.append_entry(tid, &new_refs)?;
        self.index
            .entry(db.to_string())
            .or_default()
            .insert(oid, offset);
        Ok(())
    }

    /// Tests membership of `(db, oid)`.
    pub fn has(&self, db: &str, oid: Oid) -> bool {
        self.index
            .get(db)
            .is_some_and(|m| m.contains_key(&oid))
    }

    /// Total number of `(db, oid)` entries across every db. A count, not
    /// the emptiness predicate withheld above — callers comparing sizes
    /// (e.g. two runs' candidate sets) need this; deciding termination by
    /// testing it against zero is still the caller's mistake to avoid.
    pub fn len(&self) -> usize {
        self.index.values().map(HashMap::len).sum()
    }

    /// Drops the entry for `(db, oid)` without reading it.
    pub fn remove(&mut self, db: &str, oid: Oid) -> bool {
        let Some(m) = self.index.get_mut(db) else {
            return false;
        };
        let removed = m.remove(&oid).is_some();
        if m.is_empty() {
            self.index.remove(db);
        }
        removed
    }

    /// Removes the entry for `(db, oid)` and returns its ref list, used
    /// when promoting a candidate-garbage oid back to `good`.
    pub fn pop(&mut self, db: &str, oid: Oid) -> io::Result<Option<Vec<BadRef>>> {
        let offset = match self.index.get_mut(db).and_then(|m| m.remove(&oid)) {
            Some(offset) => offset,
            None => return Ok(None),
        };
        if self.index.get(db).is_some_and(HashMap::is_empty) {
            self.index.remove(db);
        }
        let (_, refs) = self.read_entry(offset)?;
        Ok(Some(refs.into_iter().collect()))
    }

    /// Iterates `(oid, tid)` pairs for one db, in arbitrary order, used by
    /// the Sweeper.
    pub fn iterator(&mut self, db: &str) -> io::Result<Vec<(Oid, Tid)>> {
        let offsets: Vec<(Oid, u64)> = match self.index.get(db) {
            Some(m) => m.iter().map(|(&oid, &offset)| (oid, offset)).collect(),
            None => Vec::new(),
        };
        let mut out = Vec::with_capacity(offsets.len());
        for (oid, offset) in offsets {
            let (tid, _) = self.read_entry(offset)?;
            out.push((oid, tid));
        }
        Ok(out)
    }

    fn append_entry(&mut self, tid: Tid, refs: &BTreeSet<BadRef>) -> io::Result<u64> {
        let file = self.scratch.as_file_mut();
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(tid.as_bytes())?;
        file.write_all(&(refs.len() as u32).to_le_bytes())?;
        for (db, oid) in refs {
            let name = db.as_bytes();
            file.write_all(&[name.len() as u8])?;
            file.write_all(name)?;
            file.write_all(oid.as_bytes())?;
        }
        Ok(offset)
    }

    fn rewrite_tid(&mut self, offset: u64, tid: Tid) -> io::Result<()> {
        let file = self.scratch.as_file_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(tid.as_bytes())?;
        Ok(())
    }

    fn read_entry(&mut self, offset: u64) -> io::Result<(Tid, BTreeSet<BadRef>)> {
        let file = self.scratch.as_file_mut();
        file.seek(SeekFrom::Start(offset))?;
        let mut tid_buf = [0u8; 8];
        file.read_exact(&mut tid_buf)?;
        let tid = Tid::from_bytes(tid_buf);

        let mut count_buf = [0u8; 4];
        file.read_exact(&mut count_buf)?;
        let count = u32::from_le_bytes(count_buf);

        let mut refs = BTreeSet::new();
        for _ in 0..count {
            let mut len_buf = [0u8; 1];
            file.read_exact(&mut len_buf)?;
            let mut name_buf = vec![0u8; len_buf[0] as usize];
            file.read_exact(&mut name_buf)?;
            let name = String::from_utf8(name_buf)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let mut oid_buf = [0u8; 8];
            file.read_exact(&mut oid_buf)?;
            refs.insert((name, Oid::from_bytes(oid_buf)));
        }
        Ok((tid, refs))
    }
}
