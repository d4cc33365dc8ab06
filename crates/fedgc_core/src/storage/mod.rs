//! The storage collaborator contract (spec.md §6).
//!
//! The storage engine itself is out of scope for this crate (spec.md §1);
//! this module defines only the boundary the Marker, Sweeper and Checker
//! consume, plus two concrete collaborators ([`memory::MemoryStorage`] and
//! [`file::FileStorage`]) sufficient to exercise the core end to end.

use crate::error::StorageError;
use crate::oid::{Oid, Tid};
use std::path::PathBuf;

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Convenience Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// One transaction record as delivered by a store's iterator.
///
/// `data` empty means a deletion record (spec.md §3).
#[derive(Debug, Clone)]
pub struct Record {
    pub oid: Oid,
    pub tid: Tid,
    pub data: Vec<u8>,
}

impl Record {
    /// Whether this record represents a deletion.
    pub fn is_deletion(&self) -> bool {
        self.data.is_empty()
    }
}

/// An open write transaction against a store.
///
/// The core never inspects this beyond passing it back into the same
/// store's `tpc_*` methods; storages are free to give it whatever internal
/// identity they need.
#[derive(Debug)]
pub struct TxnHandle {
    pub(crate) id: u64,
}

/// The collaborator contract every participating database must implement
/// (spec.md §6, "Storage collaborator contract").
pub trait Storage {
    /// Loads the current data and tid for `oid`. Errors with
    /// [`StorageError::KeyMissing`] if no revision of `oid` exists.
    fn load(&self, oid: Oid) -> StorageResult<(Vec<u8>, Tid)>;

    /// Loads the blob data for `oid` at `tid`, returning a path to it.
    fn load_blob(&self, oid: Oid, tid: Tid) -> StorageResult<PathBuf>;

    /// Iterates transaction records in commit order. `start` is inclusive,
    /// `stop` is exclusive; either bound may be omitted.
    fn iterator<'a>(
        &'a self,
        start: Option<Tid>,
        stop: Option<Tid>,
    ) -> StorageResult<Box<dyn Iterator<Item = StorageResult<Record>> + 'a>>;

    /// Begins a new write transaction.
    fn tpc_begin(&mut self) -> StorageResult<TxnHandle>;

    /// Deletes `oid` within `txn`, guarded on `tid`: if the object has been
    /// modified since `tid`, this must fail with
    /// [`StorageError::Conflict`] rather than delete the newer revision.
    fn delete_object(&mut self, txn: &mut TxnHandle, oid: Oid, tid: Tid) -> StorageResult<()>;

    /// Votes on `txn`, the first phase of two-phase commit.
    fn tpc_vote(&mut self, txn: &mut TxnHandle) -> StorageResult<()>;

    /// Commits `txn`.
    fn tpc_finish(&mut self, txn: TxnHandle) -> StorageResult<()>;

    /// Aborts `txn`, discarding any pending deletions.
    fn tpc_abort(&mut self, txn: TxnHandle) -> StorageResult<()>;

    /// Whether references leaving this database into another are permitted.
    fn allows_xrefs(&self) -> bool;
}
