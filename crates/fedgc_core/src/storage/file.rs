//! A flat-file [`Storage`] backed by a single append-only commit log.
//!
//! Grounded on `ObjectStore`'s temp-file-plus-fsync write discipline and on
//! `Refs`'s append-then-rename pattern, simplified to a single sequential
//! log file per database (no sharding, no compression, no content hashing —
//! none of those are part of this contract).

use crate::error::StorageError;
use crate::oid::{Oid, Tid};
use crate::storage::{Record, Storage, StorageResult, TxnHandle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

const LOG_FILE_NAME: &str = "commits.log";

#[derive(Serialize, Deserialize)]
struct OnDiskRecord {
    oid: [u8; 8],
    tid: [u8; 8],
    data: Vec<u8>,
}

/// A store rooted at a directory on disk, holding one commit log file.
pub struct FileStorage {
    root: PathBuf,
    xrefs: bool,
    current: HashMap<Oid, Tid>,
    next_tid: u64,
    next_txn: u64,
    pending: HashMap<u64, Vec<(Oid, Tid)>>,
}

impl FileStorage {
    /// Opens (creating if needed) a file store rooted at `root`, replaying
    /// its commit log to rebuild the in-memory `current` index.
    pub fn open(root: impl AsRef<Path>, xrefs: bool) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let mut store = Self {
            root,
            xrefs,
            current: HashMap::new(),
            next_tid: 0,
            next_txn: 0,
            pending: HashMap::new(),
        };
        store.replay()?;
        Ok(store)
    }

    fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE_NAME)
    }

    fn replay(&mut self) -> StorageResult<()> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(());
        }
        let file = File::open(&path)?;
        let mut reader = BufReader::new(file);
        let mut max_tid = 0u64;
        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(StorageError::Io(e)),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            let rec: OnDiskRecord = postcard::from_bytes(&buf)
                .map_err(|e| StorageError::Transaction(format!("corrupt log entry: {e}")))?;
            let oid = Oid::from_bytes(rec.oid);
            let tid = Tid::from_bytes(rec.tid);
            max_tid = max_tid.max(tid.as_u64());
            self.current.insert(oid, tid);
        }
        self.next_tid = max_tid + 1;
        Ok(())
    }

    /// Appends a record to the log, fsyncing before returning so that a
    /// crash cannot leave a torn write behind.
    fn append(&self, oid: Oid, tid: Tid, data: &[u8]) -> StorageResult<()> {
        let rec = OnDiskRecord {
            oid: *oid.as_bytes(),
            tid: *tid.as_bytes(),
            data: data.to_vec(),
        };
        let encoded = postcard::to_stdvec(&rec)
            .map_err(|e| StorageError::Transaction(format!("encode failed: {e}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        file.write_all(&(encoded.len() as u32).to_le_bytes())?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        Ok(())
    }

    /// Commits a new revision of `oid`, returning the assigned tid. An
    /// empty `data` commits a deletion record.
    pub fn commit(&mut self, oid: Oid, data: impl Into<Vec<u8>>) -> StorageResult<Tid> {
        let tid = Tid::from_u64(self.next_tid);
        self.next_tid += 1;
        let data = data.into();
        self.append(oid, tid, &data)?;
        self.current.insert(oid, tid);
        Ok(tid)
    }

    fn read_all(&self) -> StorageResult<Vec<Record>> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path)?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(StorageError::Io(e)),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            let rec: OnDiskRecord = postcard::from_bytes(&buf)
                .map_err(|e| StorageError::Transaction(format!("corrupt log entry: {e}")))?;
            records.push(Record {
                oid: Oid::from_bytes(rec.oid),
                tid: Tid::from_bytes(rec.tid),
                data: rec.data,
            });
        }
        Ok(records)
    }
}

impl Storage for FileStorage {
    fn load(&self, oid: Oid) -> StorageResult<(Vec<u8>, Tid)> {
        let tid = self
            .current
            .get(&oid)
            .copied()
            .ok_or_else(|| StorageError::KeyMissing(oid.as_hex()))?;
        let records = self.read_all()?;
        let rec = records
            .into_iter()
            .rev()
            .find(|r| r.oid == oid && r.tid == tid)
            .ok_or_else(|| StorageError::KeyMissing(oid.as_hex()))?;
        if rec.is_deletion() {
            return Err(StorageError::KeyMissing(oid.as_hex()));
        }
        Ok((rec.data, rec.tid))
    }

    fn load_blob(&self, oid: Oid, tid: Tid) -> StorageResult<PathBuf> {
        let (_, stored_tid) = self.load(oid)?;
        if stored_tid != tid {
            return Err(StorageError::KeyMissing(oid.as_hex()));
        }
        Ok(self.log_path())
    }

    fn iterator<'a>(
        &'a self,
        start: Option<Tid>,
        stop: Option<Tid>,
    ) -> StorageResult<Box<dyn Iterator<Item = StorageResult<Record>> + 'a>> {
        let start = start.unwrap_or(Tid::MIN);
        let stop = stop.unwrap_or(Tid::MAX);
        let records = self.read_all()?;
        let filtered: Vec<_> = records
            .into_iter()
            .filter(|r| r.tid >= start && r.tid < stop)
            .map(Ok)
            .collect();
        Ok(Box::new(filtered.into_iter()))
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
            self.commit(oid, Vec::new())?;
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
