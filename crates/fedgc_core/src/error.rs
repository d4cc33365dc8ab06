//! Error types for fedgc_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Error raised by a [`crate::storage::Storage`] implementation.
///
/// `KeyMissing` and `Conflict` are the only variants the Sweeper recovers
/// from locally (spec.md §7); every other storage failure propagates as a
/// fatal [`GcError::Storage`].
#[derive(Error, Debug)]
pub enum StorageError {
    /// No record exists for this oid (or this oid/tid pair).
    #[error("key missing: {0}")]
    KeyMissing(String),

    /// The object was modified since the tid the caller expected.
    #[error("conflict: {0} was modified since the expected revision")]
    Conflict(String),

    /// A transaction was misused (e.g. vote called twice, or out of order).
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Underlying I/O failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Core error type for fedgc_core operations.
#[derive(Error, Debug)]
pub enum GcError {
    /// Loading a database's root object failed.
    #[error("root unreachable in database {db}: {source}")]
    RootUnreachable { db: String, source: StorageError },

    /// Two configurations for the same GC run disagree on db names.
    #[error("mismatched federations: primary has {primary:?}, secondary has {secondary:?}")]
    MismatchedFederations {
        primary: Vec<String>,
        secondary: Vec<String>,
    },

    /// A live record was encountered after its own deletion within pass A.
    #[error("invariant violation: {db} {oid} is live after its own deletion")]
    InvariantViolation { db: String, oid: String },

    /// A reference payload had an unrecognized shape, or was unexpectedly empty.
    #[error("corrupt record in {db} {oid}: {reason}")]
    CorruptRecord {
        db: String,
        oid: String,
        reason: String,
    },

    /// A storage collaborator returned an error that was not locally recovered.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Hex string did not decode to a valid identifier.
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// TOML configuration failed to parse or referenced an unknown backend.
    #[error("configuration error: {0}")]
    Config(String),

    /// An untransform name given to `-u` is not in the built-in registry.
    #[error("unknown untransform: {0}")]
    UnknownUntransform(String),

    /// A file given to `-f NAME=PATH` could not be read as a record stream.
    #[error("bad file storage override at {}: {}", path.display(), reason)]
    BadFileOverride { path: PathBuf, reason: String },

    /// I/O error outside of a storage collaborator (e.g. BadIndex scratch file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for fedgc_core operations.
pub type Result<T> = std::result::Result<T, GcError>;
