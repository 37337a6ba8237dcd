//! Distributed-columnar-store adapter: multi-version wide-column regions.
//!
//! Each table is one region holding versioned cells `(row, family, qualifier,
//! version)`. Writes land in a memstore; `flush` moves them to the store
//! file and `compact` rewrites the store file. Both run the engine scanner
//! through the registered [`CompactionHook`]s first, which is where the
//! transaction janitor plugs in.

mod region;
mod table;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tms_api::{Backend, CompactionHook, StoreError, TableProvider};

pub use region::Region;
pub use table::ColumnarTable;

// ═══════════════════════════════════════════════════════════════
//  ColumnarConfig
// ═══════════════════════════════════════════════════════════════

fn default_scan_caching() -> usize {
    100
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ColumnarConfig {
    /// Rows fetched per scanner round trip.
    #[serde(default = "default_scan_caching")]
    pub scan_caching: usize,
}

impl Default for ColumnarConfig {
    fn default() -> Self {
        Self {
            scan_caching: default_scan_caching(),
        }
    }
}

impl ColumnarConfig {
    /// Parse from a JSON config object; `{}` yields the defaults.
    pub fn from_json(config_json: &str) -> Result<Self, StoreError> {
        if config_json.trim() == "{}" {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(config_json)?)
    }
}

// ═══════════════════════════════════════════════════════════════
//  ColumnarStore
// ═══════════════════════════════════════════════════════════════

pub(crate) type SharedHooks = Arc<RwLock<Vec<Arc<dyn CompactionHook>>>>;

/// One engine instance: named regions plus the hooks shared by all of them.
pub struct ColumnarStore {
    config: ColumnarConfig,
    regions: RwLock<HashMap<String, Arc<Region>>>,
    hooks: SharedHooks,
}

impl ColumnarStore {
    pub fn new(config: ColumnarConfig) -> Self {
        Self {
            config,
            regions: RwLock::new(HashMap::new()),
            hooks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a hook for every region's flushes and compactions.
    /// Hooks wrap the scanner in registration order.
    pub fn register_hook(&self, hook: Arc<dyn CompactionHook>) {
        region::write_lock(&self.hooks, "hooks").push(hook);
    }

    pub fn region(&self, table: &str) -> Option<Arc<Region>> {
        region::read_lock(&self.regions, "regions").get(table).cloned()
    }

    pub fn region_names(&self) -> Vec<String> {
        region::read_lock(&self.regions, "regions").keys().cloned().collect()
    }

    /// Flush the memstore of `table` into its store file.
    pub fn flush(&self, table: &str) -> Result<(), StoreError> {
        self.existing_region(table)?.flush()
    }

    /// Major-compact the store file of `table`.
    pub fn compact(&self, table: &str) -> Result<(), StoreError> {
        self.existing_region(table)?.compact()
    }

    fn existing_region(&self, table: &str) -> Result<Arc<Region>, StoreError> {
        self.region(table)
            .ok_or_else(|| StoreError::not_found(format!("table '{table}' does not exist")))
    }

    fn region_or_create(&self, table: &str) -> Arc<Region> {
        if let Some(region) = self.region(table) {
            return region;
        }
        let mut regions = region::write_lock(&self.regions, "regions");
        regions
            .entry(table.to_string())
            .or_insert_with(|| {
                tracing::info!(table, "created columnar region");
                Arc::new(Region::new(table.to_string(), self.hooks.clone()))
            })
            .clone()
    }
}

impl Default for ColumnarStore {
    fn default() -> Self {
        Self::new(ColumnarConfig::default())
    }
}

impl TableProvider for ColumnarStore {
    fn open_table(&self, name: &str) -> Result<Arc<dyn Backend>, StoreError> {
        if name.is_empty() {
            return Err(StoreError::config("table name is empty"));
        }
        let region = self.region_or_create(name);
        Ok(Arc::new(ColumnarTable::new(region, self.config.scan_caching)))
    }
}
