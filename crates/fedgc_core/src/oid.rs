//! Object and transaction identifiers.

use crate::error::{GcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An 8-byte big-endian object identifier, opaque to the core and local to
/// the database that allocated it.
///
/// # Examples
///
/// ```
/// use fedgc_core::Oid;
///
/// let root = Oid::ROOT;
/// assert_eq!(root.as_hex(), "0000000000000000");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Oid([u8; 8]);

impl Oid {
    /// The length of an Oid in bytes.
    pub const LEN: usize = 8;

    /// The all-zero oid used as the root object of every database.
    pub const ROOT: Oid = Oid([0u8; 8]);

    /// Creates an Oid from raw big-endian bytes.
    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Creates an Oid from a plain integer, stored big-endian.
    #[inline]
    pub fn from_u64(v: u64) -> Self {
        Self(v.to_be_bytes())
    }

    /// Returns the oid as a plain integer.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Returns a reference to the underlying 8 big-endian bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// The first 6 bytes, used by [`crate::oidset::OidSet`] as the outer map key.
    #[inline]
    pub(crate) fn prefix(&self) -> [u8; 6] {
        let mut p = [0u8; 6];
        p.copy_from_slice(&self.0[..6]);
        p
    }

    /// The last 2 bytes, used by [`crate::oidset::OidSet`] as the inner set member.
    #[inline]
    pub(crate) fn suffix(&self) -> [u8; 2] {
        let mut s = [0u8; 2];
        s.copy_from_slice(&self.0[6..]);
        s
    }

    pub(crate) fn from_prefix_suffix(prefix: [u8; 6], suffix: [u8; 2]) -> Self {
        let mut bytes = [0u8; 8];
        bytes[..6].copy_from_slice(&prefix);
        bytes[6..].copy_from_slice(&suffix);
        Self(bytes)
    }

    /// Returns this oid as a lowercase hex string, always 16 characters.
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses an oid from a hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 16 {
            return Err(GcError::InvalidHex(format!(
                "expected 16 hex chars for an oid, got {}",
                s.len()
            )));
        }
        let bytes = hex::decode(s).map_err(|e| GcError::InvalidHex(e.to_string()))?;
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| GcError::InvalidHex("invalid length".to_string()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.as_hex())
    }
}

/// An 8-byte big-endian transaction identifier. Ordering of Tids defines the
/// temporal ordering of records within a single database.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tid([u8; 8]);

impl Tid {
    /// The zero tid, smaller than every tid a store will ever allocate.
    pub const MIN: Tid = Tid([0u8; 8]);

    /// The largest representable tid.
    pub const MAX: Tid = Tid([0xff; 8]);

    /// Creates a Tid from raw big-endian bytes.
    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Returns a reference to the underlying 8 big-endian bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Creates a Tid from a plain integer (e.g. a microsecond counter),
    /// stored big-endian so that byte ordering matches integer ordering.
    #[inline]
    pub fn from_u64(v: u64) -> Self {
        Self(v.to_be_bytes())
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Computes the cutoff tid for a GC run: `now - days * 86400` seconds,
    /// expressed as microseconds since the Unix epoch.
    ///
    /// This is a concrete stand-in for `TimeStamp.raw()`; any monotonic
    /// mapping from wall-clock time to Tid works as long as it agrees with
    /// the store's own tid allocation scheme. See DESIGN.md.
    pub fn cutoff(now_unix_secs: f64, days: u32) -> Self {
        let cutoff_secs = now_unix_secs - (days as f64) * 86_400.0;
        let micros = (cutoff_secs * 1_000_000.0).max(0.0) as u64;
        Self::from_u64(micros)
    }

    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl fmt::Debug for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tid({})", self.as_hex())
    }
}

/// The name of a database within a federation. Databases may use the empty
/// string as their name, matching `spec.md`'s single-database convention.
pub type DbName = String;
