use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use tms_api::{Cell, CellScanner, Column, Put, Row, ScanFrom, StoreError, VecCellScanner};

use crate::SharedHooks;

// ── Lock helpers ──

pub(crate) fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!("{what} read lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

pub(crate) fn write_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("{what} write lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn mutex_lock<'a, T>(lock: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("{what} lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

// ── Cell keys ──

/// Sort key of a stored cell: row, then column, then newest version first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CellKey {
    row: Bytes,
    family: Bytes,
    qualifier: Bytes,
    version: Reverse<i64>,
}

impl CellKey {
    /// Smallest key any cell of `row` can have.
    fn first_of(row: &[u8]) -> Self {
        Self {
            row: Bytes::copy_from_slice(row),
            family: Bytes::new(),
            qualifier: Bytes::new(),
            version: Reverse(i64::MAX),
        }
    }

    /// Smallest key strictly after every cell of `row`.
    fn after_row(row: &[u8]) -> Self {
        let mut next = Vec::with_capacity(row.len() + 1);
        next.extend_from_slice(row);
        next.push(0);
        Self::first_of(&next)
    }

    fn of(cell: &Cell) -> Self {
        Self {
            row: cell.row.clone(),
            family: cell.family.clone(),
            qualifier: cell.qualifier.clone(),
            version: Reverse(cell.version),
        }
    }

    fn into_cell(self, value: Bytes) -> Cell {
        Cell {
            row: self.row,
            family: self.family,
            qualifier: self.qualifier,
            version: self.version.0,
            value,
        }
    }
}

type CellMap = BTreeMap<CellKey, Bytes>;

fn key_range(lower: CellKey, upper: Option<CellKey>) -> Option<(Bound<CellKey>, Bound<CellKey>)> {
    match upper {
        Some(upper) if lower >= upper => None,
        Some(upper) => Some((Bound::Included(lower), Bound::Excluded(upper))),
        None => Some((Bound::Included(lower), Bound::Unbounded)),
    }
}

#[derive(Clone, Copy)]
enum HookPoint {
    Flush,
    Compact,
}

// ═══════════════════════════════════════════════════════════════
//  Region
// ═══════════════════════════════════════════════════════════════

/// A single table's cells. Lock order is always memstore, then store.
pub struct Region {
    name: String,
    memstore: RwLock<CellMap>,
    store: RwLock<CellMap>,
    hooks: SharedHooks,
    last_version: Mutex<i64>,
    maintenance: Mutex<()>,
}

impl Region {
    pub(crate) fn new(name: String, hooks: SharedHooks) -> Self {
        Self {
            name,
            memstore: RwLock::new(BTreeMap::new()),
            store: RwLock::new(BTreeMap::new()),
            hooks,
            last_version: Mutex::new(0),
            maintenance: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server-assigned cell version: wall clock ms, strictly increasing.
    fn next_version(&self) -> i64 {
        let mut last = mutex_lock(&self.last_version, "version clock");
        let next = tms_api::now_ms().max(*last + 1);
        *last = next;
        next
    }

    pub(crate) fn put(&self, puts: Vec<Put>) {
        let mut memstore = write_lock(&self.memstore, "memstore");
        for put in puts {
            let (row, version, columns) = put.into_parts();
            let version = version.unwrap_or_else(|| self.next_version());
            for (column, value) in columns {
                let key = CellKey {
                    row: row.clone(),
                    family: column.family,
                    qualifier: column.qualifier,
                    version: Reverse(version),
                };
                memstore.insert(key, value);
            }
        }
    }

    /// Up to `limit` rows starting at `from`, each carrying the newest
    /// version of every column across memstore and store.
    pub(crate) fn fetch_rows(
        &self,
        from: ScanFrom<'_>,
        stop: Option<&[u8]>,
        limit: usize,
    ) -> Vec<Row> {
        let lower = match from {
            ScanFrom::Start(start) => CellKey::first_of(start),
            ScanFrom::After(last) => CellKey::after_row(last),
        };
        let Some(range) = key_range(lower, stop.map(CellKey::first_of)) else {
            return Vec::new();
        };

        let memstore = read_lock(&self.memstore, "memstore");
        let store = read_lock(&self.store, "store");
        let mut mem = memstore.range(range.clone()).peekable();
        let mut disk = store.range(range).peekable();

        let mut rows = Vec::new();
        let mut current: Option<Row> = None;
        loop {
            let order = match (mem.peek(), disk.peek()) {
                (Some((m, _)), Some((d, _))) => Some((*m).cmp(*d)),
                (Some(_), None) => Some(Ordering::Less),
                (None, Some(_)) => Some(Ordering::Greater),
                (None, None) => None,
            };
            let next = match order {
                Some(Ordering::Less) => mem.next(),
                Some(Ordering::Greater) => disk.next(),
                Some(Ordering::Equal) => {
                    // Same cell in both: the memstore copy is newer.
                    disk.next();
                    mem.next()
                }
                None => None,
            };
            let Some((key, value)) = next else { break };

            let same_row = current.as_ref().is_some_and(|row| row.key == key.row);
            if !same_row {
                if let Some(done) = current.take() {
                    rows.push(done);
                    if rows.len() >= limit {
                        break;
                    }
                }
                current = Some(Row::new(key.row.clone()));
            }
            if let Some(row) = current.as_mut() {
                row.columns
                    .entry(Column::new(key.family.clone(), key.qualifier.clone()))
                    .or_insert_with(|| value.clone());
            }
        }
        if let Some(row) = current {
            rows.push(row);
        }
        rows
    }

    /// Remove every version of every column of `row`.
    pub(crate) fn delete_row(&self, row: &[u8]) {
        self.delete_range(row, Some(&CellKey::after_row(row).row));
    }

    /// Remove every cell whose row lies in `[start, stop)`; returns the
    /// number of distinct rows removed.
    pub(crate) fn delete_range(&self, start: &[u8], stop: Option<&[u8]>) -> u64 {
        let Some(range) = key_range(CellKey::first_of(start), stop.map(CellKey::first_of)) else {
            return 0;
        };
        let mut memstore = write_lock(&self.memstore, "memstore");
        let mut store = write_lock(&self.store, "store");

        let mut rows = Vec::new();
        for map in [&mut *memstore, &mut *store] {
            let doomed: Vec<CellKey> = map.range(range.clone()).map(|(k, _)| k.clone()).collect();
            for key in doomed {
                map.remove(&key);
                rows.push(key.row);
            }
        }
        rows.sort();
        rows.dedup();
        rows.len() as u64
    }

    // ── Maintenance ──

    /// Move the memstore into the store, running the flush hooks over it.
    pub fn flush(&self) -> Result<(), StoreError> {
        let _maintenance = mutex_lock(&self.maintenance, "maintenance");
        let mut memstore = write_lock(&self.memstore, "memstore");
        if memstore.is_empty() {
            return Ok(());
        }
        let input = cells_of(&memstore);
        let flushed = self.run_hooks(HookPoint::Flush, input)?;

        let mut store = write_lock(&self.store, "store");
        let count = flushed.len();
        for cell in flushed {
            let value = cell.value.clone();
            store.insert(CellKey::of(&cell), value);
        }
        memstore.clear();
        tracing::debug!(region = %self.name, cells = count, "flushed memstore");
        Ok(())
    }

    /// Rewrite the store through the compaction hooks.
    pub fn compact(&self) -> Result<(), StoreError> {
        let _maintenance = mutex_lock(&self.maintenance, "maintenance");
        let mut store = write_lock(&self.store, "store");
        let before = store.len();
        let input = cells_of(&store);
        let compacted = self.run_hooks(HookPoint::Compact, input)?;

        *store = compacted
            .into_iter()
            .map(|cell| {
                let value = cell.value.clone();
                (CellKey::of(&cell), value)
            })
            .collect();
        tracing::debug!(region = %self.name, before, after = store.len(), "compacted store");
        Ok(())
    }

    fn run_hooks(&self, point: HookPoint, input: Vec<Cell>) -> Result<Vec<Cell>, StoreError> {
        let hooks = read_lock(&self.hooks, "hooks").clone();
        let scanner: Box<dyn CellScanner> = Box::new(VecCellScanner::new(input));
        let scanner = hooks.iter().fold(scanner, |scanner, hook| match point {
            HookPoint::Flush => hook.pre_flush(&self.name, scanner),
            HookPoint::Compact => hook.pre_compact(&self.name, scanner),
        });
        drain(scanner)
    }

    // ── Inspection ──

    /// Every stored cell version, memstore first, in key order.
    pub fn all_cells(&self) -> Vec<Cell> {
        let memstore = read_lock(&self.memstore, "memstore");
        let store = read_lock(&self.store, "store");
        let mut cells = cells_of(&memstore);
        cells.extend(cells_of(&store));
        cells
    }

    /// Versions held for one column, newest first.
    pub fn versions(&self, row: &[u8], family: &[u8], qualifier: &[u8]) -> Vec<i64> {
        let mut versions: Vec<i64> = self
            .all_cells()
            .into_iter()
            .filter(|c| c.row == row && c.family == family && c.qualifier == qualifier)
            .map(|c| c.version)
            .collect();
        versions.sort_unstable_by(|a, b| b.cmp(a));
        versions.dedup();
        versions
    }

    pub fn memstore_len(&self) -> usize {
        read_lock(&self.memstore, "memstore").len()
    }

    pub fn store_len(&self) -> usize {
        read_lock(&self.store, "store").len()
    }
}

fn cells_of(map: &CellMap) -> Vec<Cell> {
    map.iter().map(|(k, v)| k.clone().into_cell(v.clone())).collect()
}

/// Pull every batch out of `scanner`, closing it even when a batch fails.
fn drain(mut scanner: Box<dyn CellScanner>) -> Result<Vec<Cell>, StoreError> {
    let mut cells = Vec::new();
    let mut batch = Vec::new();
    let pulled = loop {
        match scanner.next_batch(&mut batch, None) {
            Ok(more) => {
                cells.append(&mut batch);
                if !more {
                    break Ok(());
                }
            }
            Err(e) => break Err(e),
        }
    };
    let closed = scanner.close();
    pulled?;
    closed?;
    Ok(cells)
}
