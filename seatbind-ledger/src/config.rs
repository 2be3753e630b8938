//! Ledger configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Runtime settings of a [`crate::Ledger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Maximum number of actions reduced in one settlement cycle.
    pub max_batch: usize,
    /// Directory of the JSON file store; in-memory when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_batch: 256,
            data_dir: None,
        }
    }
}

impl LedgerConfig {
    /// Loads a config from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> StoreResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
