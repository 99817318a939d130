//! Tempo account → Unit4 cost-code table.
//!
//! One JSON object keyed by account key. Entries are only ever added or
//! replaced; nothing in this crate removes one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Failed to access mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mapping file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCodeMapping {
    #[serde(alias = "unit4_arbauft")]
    pub cost_code: String,
    #[serde(default, alias = "tempo_name")]
    pub display_name: String,
    #[serde(default)]
    pub sample_ticket: String,
}

#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
    entries: BTreeMap<String, CostCodeMapping>,
}

impl MappingStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// A missing file is an empty table.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MappingError> {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), "No mapping file yet");
            return Ok(Self::empty(path));
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| MappingError::Io {
            path: path.clone(),
            source,
        })?;
        let entries = if raw.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&raw).map_err(|source| MappingError::Parse {
                path: path.clone(),
                source,
            })?
        };
        Ok(Self { path, entries })
    }

    /// Write through a temp file in the same directory so a crash never
    /// leaves a truncated table behind.
    pub fn save(&self) -> Result<(), MappingError> {
        let io_err = |source| MappingError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let json = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            MappingError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, account_key: &str) -> Option<&CostCodeMapping> {
        self.entries.get(account_key)
    }

    pub fn cost_code_for(&self, account_key: &str) -> Option<&str> {
        self.get(account_key).map(|m| m.cost_code.as_str())
    }

    /// Insert or replace; the previous mapping is returned.
    pub fn upsert(&mut self, account_key: &str, mapping: CostCodeMapping) -> Option<CostCodeMapping> {
        info!(account_key, cost_code = %mapping.cost_code, "Saving cost-code mapping");
        self.entries.insert(account_key.to_string(), mapping)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CostCodeMapping)> {
        self.entries.iter()
    }
}
