use std::path::PathBuf;

use tms_api::StoreError;

// ════════════════════════════════════════════════════════════════
//  Configuration
// ════════════════════════════════════════════════════════════════

fn default_scan_batch() -> usize {
    256
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EmbeddedConfig {
    /// Directory holding the keyspace; created when missing.
    pub data_dir: PathBuf,
    /// Fsync the journal after every mutation.
    #[serde(default)]
    pub sync_writes: bool,
    /// Rows read per scanner refill.
    #[serde(default = "default_scan_batch")]
    pub scan_batch: usize,
}

impl EmbeddedConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sync_writes: false,
            scan_batch: default_scan_batch(),
        }
    }

    pub fn from_json(config_json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(config_json)?)
    }
}
