//! Federation configuration.
//!
//! A federation configuration names every database in a multi-database and
//! says how to open it. The parsing itself is the only part of spec.md's
//! "configuration file" collaborator (§6) that this crate owns; everything
//! downstream of `{db-name -> Storage}` is the federation proper
//! ([`crate::federation`]).

use crate::error::{GcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A parsed federation configuration: one entry per named database.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FederationConfig {
    #[serde(default)]
    pub databases: BTreeMap<String, DbConfig>,
}

impl FederationConfig {
    /// Loads a federation configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| GcError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| GcError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Saves a federation configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GcError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)
            .map_err(|e| GcError::Config(format!("failed to write {}: {}", path.display(), e)))?;
        Ok(())
    }

    /// The set of database names this configuration describes.
    pub fn db_names(&self) -> std::collections::BTreeSet<String> {
        self.databases.keys().cloned().collect()
    }
}

/// Per-database configuration: which storage backend to open, and whether
/// cross-database references are permitted from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub storage: StorageConfig,

    /// Whether references leaving this db into another db are allowed.
    #[serde(default = "default_xrefs")]
    pub xrefs: bool,
}

fn default_xrefs() -> bool {
    true
}

/// Which storage backend to open for a given database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    /// An in-process store with no persistence, used by tests.
    Memory,
    /// A flat-file store rooted at `path`.
    File { path: PathBuf },
}
