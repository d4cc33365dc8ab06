//! Opens a federation of stores from a [`FederationConfig`] (spec.md §6).

use crate::config::{DbConfig, FederationConfig, StorageConfig};
use crate::error::{GcError, Result};
use crate::oid::DbName;
use crate::storage::{FileStorage, MemoryStorage, Storage};
use std::collections::BTreeMap;

/// An opened set of named, live stores.
pub struct Federation {
    stores: BTreeMap<DbName, Box<dyn Storage>>,
}

impl std::fmt::Debug for Federation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Federation")
            .field("db_names", &self.db_names())
            .finish()
    }
}

impl Federation {
    /// Opens every database named in `config`.
    pub fn open(config: &FederationConfig) -> Result<Self> {
        let mut stores: BTreeMap<DbName, Box<dyn Storage>> = BTreeMap::new();
        for (name, db_config) in &config.databases {
            stores.insert(name.clone(), open_one(db_config)?);
        }
        Ok(Self { stores })
    }

    /// The set of database names in this federation.
    pub fn db_names(&self) -> std::collections::BTreeSet<DbName> {
        self.stores.keys().cloned().collect()
    }

    /// Consumes the federation, yielding the underlying store map.
    pub fn into_stores(self) -> BTreeMap<DbName, Box<dyn Storage>> {
        self.stores
    }

    /// Borrows the underlying store map.
    pub fn stores(&self) -> &BTreeMap<DbName, Box<dyn Storage>> {
        &self.stores
    }
}

fn open_one(config: &DbConfig) -> Result<Box<dyn Storage>> {
    match &config.storage {
        StorageConfig::Memory => Ok(Box::new(MemoryStorage::new(config.xrefs))),
        StorageConfig::File { path } => {
            Ok(Box::new(FileStorage::open(path, config.xrefs)?))
        }
    }
}

/// Opens both configurations for a GC run and checks they name the same
/// set of databases before either is used for anything else (spec.md §7,
/// *MismatchedFederations*: fatal before any work).
pub fn open_matched_pair(
    primary: &FederationConfig,
    secondary: Option<&FederationConfig>,
) -> Result<(Federation, Option<Federation>)> {
    let primary_fed = Federation::open(primary)?;
    let secondary_fed = match secondary {
        Some(cfg) => {
            let fed = Federation::open(cfg)?;
            if fed.db_names() != primary_fed.db_names() {
                return Err(GcError::MismatchedFederations {
                    primary: primary_fed.db_names().into_iter().collect(),
                    secondary: fed.db_names().into_iter().collect(),
                });
            }
            Some(fed)
        }
        None => None,
    };
    Ok((primary_fed, secondary_fed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;

    fn memory_config(names: &[&str]) -> FederationConfig {
        let mut cfg = FederationConfig::default();
        for name in names {
            cfg.databases.insert(
                name.to_string(),
                DbConfig {
                    storage: StorageConfig::Memory,
                    xrefs: true,
                },
            );
        }
        cfg
    }

    #[test]
    fn matched_pair_opens_cleanly() {
        let a = memory_config(&["x", "y"]);
        let b = memory_config(&["x", "y"]);
        let (primary, secondary) = open_matched_pair(&a, Some(&b)).unwrap();
        assert_eq!(primary.db_names(), secondary.unwrap().db_names());
    }

    #[test]
    fn mismatched_pair_is_rejected_before_any_work() {
        let a = memory_config(&["x", "y"]);
        let b = memory_config(&["x", "z"]);
        let err = open_matched_pair(&a, Some(&b)).unwrap_err();
        assert!(matches!(err, GcError::MismatchedFederations { .. }));
    }

    #[test]
    fn no_secondary_is_fine() {
        let a = memory_config(&["x"]);
        let (primary, secondary) = open_matched_pair(&a, None).unwrap();
        assert_eq!(primary.db_names().len(), 1);
        assert!(secondary.is_none());
    }
}
