use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tms_api::{Backend, BatchScanner, Column, Put, RowScanner, ScanFrom, StoreError, TableProvider};

use crate::codec;
use crate::config::EmbeddedConfig;

fn engine_err(op: &'static str) -> impl Fn(fjall::Error) -> StoreError {
    move |e| StoreError::backend(format!("fjall {op}"), e)
}

fn validate_table_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::config("table name is empty"));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '#' | '$'));
    if !valid {
        return Err(StoreError::config(format!(
            "invalid table name '{name}': only [A-Za-z0-9_-#$] allowed"
        )));
    }
    Ok(())
}

// ════════════════════════════════════════════════════════════════
//  EmbeddedStore
// ════════════════════════════════════════════════════════════════

/// One fjall keyspace on disk; hands out a table handle per partition.
pub struct EmbeddedStore {
    config: EmbeddedConfig,
    keyspace: Keyspace,
    /// Serializes read-modify-write row merges across all handles.
    write_lock: Arc<Mutex<()>>,
}

impl EmbeddedStore {
    pub fn open(config: EmbeddedConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            StoreError::from(e).with_context(format!("create {}", config.data_dir.display()))
        })?;
        let keyspace = fjall::Config::new(&config.data_dir)
            .open()
            .map_err(engine_err("open keyspace"))?;
        tracing::info!(data_dir = %config.data_dir.display(), "opened embedded keyspace");
        Ok(Self {
            config,
            keyspace,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn config(&self) -> &EmbeddedConfig {
        &self.config
    }

    /// Fsync the journal.
    pub fn persist(&self) -> Result<(), StoreError> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(engine_err("persist"))
    }
}

impl TableProvider for EmbeddedStore {
    fn open_table(&self, name: &str) -> Result<Arc<dyn Backend>, StoreError> {
        validate_table_name(name)?;
        let partition = self
            .keyspace
            .open_partition(name, PartitionCreateOptions::default())
            .map_err(engine_err("open partition"))?;
        tracing::debug!(table = name, "opened embedded table");
        Ok(Arc::new(EmbeddedTable {
            name: name.to_string(),
            keyspace: self.keyspace.clone(),
            partition,
            write_lock: self.write_lock.clone(),
            sync_writes: self.config.sync_writes,
            scan_batch: self.config.scan_batch,
            closed: AtomicBool::new(false),
        }))
    }
}

// ════════════════════════════════════════════════════════════════
//  EmbeddedTable
// ════════════════════════════════════════════════════════════════

pub struct EmbeddedTable {
    name: String,
    keyspace: Keyspace,
    partition: PartitionHandle,
    write_lock: Arc<Mutex<()>>,
    sync_writes: bool,
    scan_batch: usize,
    closed: AtomicBool,
}

impl EmbeddedTable {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::closed(format!("table '{}' is closed", self.name)));
        }
        Ok(())
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(table = %self.name, "write lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn load_columns(&self, row: &[u8]) -> Result<BTreeMap<Column, Bytes>, StoreError> {
        match self.partition.get(row).map_err(engine_err("get"))? {
            Some(value) => codec::decode_columns(&value),
            None => Ok(BTreeMap::new()),
        }
    }

    fn after_write(&self) -> Result<(), StoreError> {
        if self.sync_writes {
            self.keyspace
                .persist(PersistMode::SyncAll)
                .map_err(engine_err("persist"))?;
        }
        Ok(())
    }
}

impl Backend for EmbeddedTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, put: Put) -> Result<(), StoreError> {
        self.put_all(vec![put])
    }

    /// Merges each put into the stored row; later puts win per column.
    /// Cell versions are not kept by this engine.
    fn put_all(&self, puts: Vec<Put>) -> Result<(), StoreError> {
        self.ensure_open()?;
        if puts.is_empty() {
            return Ok(());
        }
        let _guard = self.lock_writes();

        let mut pending: BTreeMap<Bytes, BTreeMap<Column, Bytes>> = BTreeMap::new();
        for put in puts {
            let (row, _version, columns) = put.into_parts();
            if !pending.contains_key(&row) {
                let existing = self.load_columns(&row)?;
                pending.insert(row.clone(), existing);
            }
            if let Some(merged) = pending.get_mut(&row) {
                merged.extend(columns);
            }
        }

        let mut batch = self.keyspace.batch();
        for (row, columns) in &pending {
            batch.insert(&self.partition, row.as_ref(), codec::encode_columns(columns)?.as_ref());
        }
        batch.commit().map_err(engine_err("commit"))?;
        self.after_write()
    }

    fn scan(&self, start: &[u8], stop: Option<&[u8]>) -> Result<Box<dyn RowScanner>, StoreError> {
        self.ensure_open()?;
        let partition = self.partition.clone();
        let stop = stop.map(Bytes::copy_from_slice);
        let start = Bytes::copy_from_slice(start);
        Ok(Box::new(BatchScanner::new(start, self.scan_batch, move |from, limit| {
            let (first, lower) = match from {
                ScanFrom::Start(key) => (key, Bound::Included(key.to_vec())),
                ScanFrom::After(key) => (key, Bound::Excluded(key.to_vec())),
            };
            let upper = match &stop {
                Some(stop) if first >= stop.as_ref() => return Ok(Vec::new()),
                Some(stop) => Bound::Excluded(stop.to_vec()),
                None => Bound::Unbounded,
            };
            let mut rows = Vec::with_capacity(limit);
            for item in partition.range((lower, upper)).take(limit) {
                let (key, value) = item.map_err(engine_err("scan"))?;
                rows.push(codec::decode_row(&key, &value)?);
            }
            Ok(rows)
        })))
    }

    fn delete(&self, row: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        let _guard = self.lock_writes();
        self.partition.remove(row).map_err(engine_err("remove"))?;
        self.after_write()
    }

    fn delete_range(&self, start: &[u8], stop: Option<&[u8]>) -> Result<u64, StoreError> {
        self.ensure_open()?;
        if stop.is_some_and(|stop| start >= stop) {
            return Ok(0);
        }
        let _guard = self.lock_writes();
        let upper = match stop {
            Some(stop) => Bound::Excluded(stop.to_vec()),
            None => Bound::Unbounded,
        };

        let mut batch = self.keyspace.batch();
        let mut removed = 0u64;
        for item in self.partition.range((Bound::Included(start.to_vec()), upper)) {
            let (key, _) = item.map_err(engine_err("scan"))?;
            batch.remove(&self.partition, key.as_ref());
            removed += 1;
        }
        if removed > 0 {
            batch.commit().map_err(engine_err("commit"))?;
            self.after_write()?;
        }
        Ok(removed)
    }

    fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(table = %self.name, "closing embedded table");
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(engine_err("persist"))
    }
}
