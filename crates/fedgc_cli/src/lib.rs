//! Shared plumbing for the `multi-zodb-gc` and `multi-zodb-check-refs`
//! binaries: logging setup, the `-f NAME=PATH` / `-u NAME` override path,
//! and back-reference persistence for `-r PATH`.

use fedgc_core::checker::{BackRefIndex, BACK_REF_COMMIT_INTERVAL};
use fedgc_core::storage::{Record, Storage, StorageResult, TxnHandle};
use fedgc_core::{Oid, StorageError, Tid};
use redb::TableDefinition;
use std::path::{Path, PathBuf};

const BACK_REFS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("back_refs");

/// Initializes the tracing subscriber, honoring an explicit `-l LEVEL`
/// first and `RUST_LOG` otherwise, matching the teacher's CLI init.
pub fn init_logging(level: Option<&str>) {
    let filter = level
        .map(tracing_subscriber::EnvFilter::new)
        .or_else(|| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Parses one `-f NAME=PATH` argument.
pub fn parse_file_override(spec: &str) -> anyhow::Result<(String, PathBuf)> {
    let (name, path) = spec
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected NAME=PATH, got {spec:?}"))?;
    Ok((name.to_string(), PathBuf::from(path)))
}

/// Wraps a [`Storage`] so every non-deletion record's bytes pass through an
/// untransform function before the extractor ever sees them. Backs the
/// `-u NAME` flag, which only has an effect together with `-f`.
pub struct UntransformingStorage {
    inner: Box<dyn Storage>,
    untransform: fn(&[u8]) -> Option<Vec<u8>>,
}

impl UntransformingStorage {
    pub fn new(inner: Box<dyn Storage>, untransform: fn(&[u8]) -> Option<Vec<u8>>) -> Self {
        Self { inner, untransform }
    }

    fn apply(&self, oid: Oid, data: Vec<u8>) -> StorageResult<Vec<u8>> {
        (self.untransform)(&data)
            .ok_or_else(|| StorageError::Transaction(format!("untransform rejected record {oid}")))
    }
}

impl Storage for UntransformingStorage {
    fn load(&self, oid: Oid) -> StorageResult<(Vec<u8>, Tid)> {
        let (data, tid) = self.inner.load(oid)?;
        Ok((self.apply(oid, data)?, tid))
    }

    fn load_blob(&self, oid: Oid, tid: Tid) -> StorageResult<PathBuf> {
        self.inner.load_blob(oid, tid)
    }

    fn iterator<'a>(
        &'a self,
        start: Option<Tid>,
        stop: Option<Tid>,
    ) -> StorageResult<Box<dyn Iterator<Item = StorageResult<Record>> + 'a>> {
        let inner = self.inner.iterator(start, stop)?;
        Ok(Box::new(inner.map(move |r| {
            let rec = r?;
            if rec.is_deletion() {
                return Ok(rec);
            }
            let data = self.apply(rec.oid, rec.data)?;
            Ok(Record { data, ..rec })
        })))
    }

    fn tpc_begin(&mut self) -> StorageResult<TxnHandle> {
        self.inner.tpc_begin()
    }

    fn delete_object(&mut self, txn: &mut TxnHandle, oid: Oid, tid: Tid) -> StorageResult<()> {
        self.inner.delete_object(txn, oid, tid)
    }

    fn tpc_vote(&mut self, txn: &mut TxnHandle) -> StorageResult<()> {
        self.inner.tpc_vote(txn)
    }

    fn tpc_finish(&mut self, txn: TxnHandle) -> StorageResult<()> {
        self.inner.tpc_finish(txn)
    }

    fn tpc_abort(&mut self, txn: TxnHandle) -> StorageResult<()> {
        self.inner.tpc_abort(txn)
    }

    fn allows_xrefs(&self) -> bool {
        self.inner.allows_xrefs()
    }
}

fn back_ref_key(db: &str, oid: Oid) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + db.len() + Oid::LEN);
    key.push(db.len() as u8);
    key.extend_from_slice(db.as_bytes());
    key.extend_from_slice(oid.as_bytes());
    key
}

/// Persists a [`BackRefIndex`] to a `redb` database at `path`, committing
/// every [`BACK_REF_COMMIT_INTERVAL`] entries so one run never holds an
/// unbounded write transaction open.
pub fn persist_back_refs(path: &Path, index: &BackRefIndex) -> anyhow::Result<()> {
    let db = redb::Database::create(path)?;
    let mut entries = index.iter();
    loop {
        let write_txn = db.begin_write()?;
        let mut wrote = 0usize;
        {
            let mut table = write_txn.open_table(BACK_REFS_TABLE)?;
            for (db_name, oid, back_refs) in entries.by_ref().take(BACK_REF_COMMIT_INTERVAL) {
                let key = back_ref_key(db_name, oid);
                let value = postcard::to_stdvec(back_refs)?;
                table.insert(key.as_slice(), value.as_slice())?;
                wrote += 1;
            }
        }
        write_txn.commit()?;
        if wrote < BACK_REF_COMMIT_INTERVAL {
            break;
        }
    }
    Ok(())
}
