//! An in-memory [`Storage`] used by unit and integration tests.
//!
//! Grounded on `ObjectStore`'s put/get surface, stripped of content hashing
//! and compression: records are kept in commit order, keyed by [`Tid`], with
//! a `current` index mapping each oid to its latest tid for the delete
//! guard in [`Storage::delete_object`].

use crate::error::StorageError;
use crate::oid::{Oid, Tid};
use crate::storage::{Record, Storage, StorageResult, TxnHandle};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;

/// An in-memory store. Not persisted; built fresh per test.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    /// Commit log, ordered by tid.
    log: BTreeMap<Tid, (Oid, Vec<u8>)>,
    /// Latest tid seen for each oid, including deletions.
    current: HashMap<Oid, Tid>,
    next_tid: u64,
    next_txn: u64,
    pending: HashMap<u64, Vec<(Oid, Tid)>>,
    xrefs: bool,
}

impl MemoryStorage {
    /// Creates an empty store. Callers are responsible for committing a
    /// root record (`Oid::ROOT`) before handing this to the Marker or
    /// Checker, exactly as a real store ships with a root object already
    /// present.
    pub fn new(xrefs: bool) -> Self {
        Self {
            xrefs,
            ..Default::default()
        }
    }

    /// Commits a new revision of `oid` with the given record bytes,
    /// returning the tid it was assigned. An empty `data` commits a
    /// deletion record.
    pub fn commit(&mut self, oid: Oid, data: impl Into<Vec<u8>>) -> Tid {
        let tid = Tid::from_u64(self.next_tid);
        self.next_tid += 1;
        let data = data.into();
        self.log.insert(tid, (oid, data));
        self.current.insert(oid, tid);
        tid
    }

    /// The tid of the most recent commit, if any.
    pub fn head(&self) -> Option<Tid> {
        self.log.keys().next_back().copied()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, oid: Oid) -> StorageResult<(Vec<u8>, Tid)> {
        let tid = self
            .current
            .get(&oid)
            .copied()
            .ok_or_else(|| StorageError::KeyMissing(oid.as_hex()))?;
        let (_, data) = self
            .log
            .get(&tid)
            .ok_or_else(|| StorageError::KeyMissing(oid.as_hex()))?;
        if data.is_empty() {
            return Err(StorageError::KeyMissing(oid.as_hex()));
        }
        Ok((data.clone(), tid))
    }

    fn load_blob(&self, oid: Oid, tid: Tid) -> StorageResult<PathBuf> {
        let (_, stored_tid) = self.load(oid)?;
        if stored_tid != tid {
            return Err(StorageError::KeyMissing(oid.as_hex()));
        }
        Ok(PathBuf::from(format!("memory://{}/{}", oid.as_hex(), tid)))
    }

    fn iterator<'a>(
        &'a self,
        start: Option<Tid>,
        stop: Option<Tid>,
    ) -> StorageResult<Box<dyn Iterator<Item = StorageResult<Record>> + 'a>> {
        let start = start.unwrap_or(Tid::MIN);
        let stop = stop.unwrap_or(Tid::MAX);
        let iter = self
            .log
            .range(start..stop)
            .map(|(tid, (oid, data))| {
                Ok(Record {
                    oid: *oid,
                    tid: *tid,
                    data: data.clone(),
                })
            });
        Ok(Box::new(iter))
    }

    fn tpc_begin(&mut self) -> StorageResult<TxnHandle> {
        let id = self.next_txn;
        self.next_txn += 1;
        self.pending.insert(id, Vec::new());
        Ok(TxnHandle { id })
    }

    fn delete_object(&mut self, txn: &mut TxnHandle, oid: Oid, tid: Tid) -> StorageResult<()> {
        let current_tid = self
            .current
            .get(&oid)
            .copied()
            .ok_or_else(|| StorageError::KeyMissing(oid.as_hex()))?;
        if current_tid != tid {
            return Err(StorageError::Conflict(oid.as_hex()));
        }
        self.pending.get_mut(&txn.id).expect("open txn").push((oid, tid));
        Ok(())
    }

    fn tpc_vote(&mut self, _txn: &mut TxnHandle) -> StorageResult<()> {
        Ok(())
    }

    fn tpc_finish(&mut self, txn: TxnHandle) -> StorageResult<()> {
        let deletions = self.pending.remove(&txn.id).unwrap_or_default();
        for (oid, guard_tid) in deletions {
            if self.current.get(&oid).copied() != Some(guard_tid) {
                continue;
            }
            self.commit(oid, Vec::new());
        }
        Ok(())
    }

    fn tpc_abort(&mut self, txn: TxnHandle) -> StorageResult<()> {
        self.pending.remove(&txn.id);
        Ok(())
    }

    fn allows_xrefs(&self) -> bool {
        self.xrefs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_then_load_returns_latest_revision() {
        let mut store = MemoryStorage::new(true);
        store.commit(Oid::ROOT, b"root-v1".to_vec());
        let tid = store.commit(Oid::ROOT, b"root-v2".to_vec());
        let (data, loaded_tid) = store.load(Oid::ROOT).unwrap();
        assert_eq!(data, b"root-v2");
        assert_eq!(loaded_tid, tid);
    }

    #[test]
    fn delete_then_load_is_key_missing() {
        let mut store = MemoryStorage::new(true);
        let tid = store.commit(Oid::from_u64(1), b"hello".to_vec());
        let mut txn = store.tpc_begin().unwrap();
        store.delete_object(&mut txn, Oid::from_u64(1), tid).unwrap();
        store.tpc_vote(&mut txn).unwrap();
        store.tpc_finish(txn).unwrap();
        assert!(matches!(
            store.load(Oid::from_u64(1)),
            Err(StorageError::KeyMissing(_))
        ));
    }

    #[test]
    fn delete_with_stale_tid_conflicts() {
        let mut store = MemoryStorage::new(true);
        let tid1 = store.commit(Oid::from_u64(1), b"v1".to_vec());
        store.commit(Oid::from_u64(1), b"v2".to_vec());
        let mut txn = store.tpc_begin().unwrap();
        let err = store
            .delete_object(&mut txn, Oid::from_u64(1), tid1)
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[test]
    fn iterator_respects_bounds() {
        let mut store = MemoryStorage::new(true);
        let t1 = store.commit(Oid::from_u64(1), b"a".to_vec());
        let _t2 = store.commit(Oid::from_u64(2), b"b".to_vec());
        let recs: Vec<_> = store
            .iterator(Some(t1), None)
            .unwrap()
            .collect::<StorageResult<Vec<_>>>()
            .unwrap();
        assert_eq!(recs.len(), 2);
    }
}
