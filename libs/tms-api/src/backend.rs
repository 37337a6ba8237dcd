use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::StoreError;

// ════════════════════════════════════════════════════════════════
//  Rows and mutations
// ════════════════════════════════════════════════════════════════

/// Column identity inside a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Column {
    pub family: Bytes,
    pub qualifier: Bytes,
}

impl Column {
    pub fn new(family: impl Into<Bytes>, qualifier: impl Into<Bytes>) -> Self {
        Self { family: family.into(), qualifier: qualifier.into() }
    }
}

/// One row returned by a scan: the newest value of each of its columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    pub key: Bytes,
    pub columns: BTreeMap<Column, Bytes>,
}

impl Row {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Self { key: key.into(), columns: BTreeMap::new() }
    }

    pub fn get(&self, family: &[u8], qualifier: &[u8]) -> Option<&Bytes> {
        self.columns
            .iter()
            .find(|(c, _)| c.family == family && c.qualifier == qualifier)
            .map(|(_, v)| v)
    }
}

/// Write of one or more columns of a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
    row: Bytes,
    version: Option<i64>,
    columns: Vec<(Column, Bytes)>,
}

impl Put {
    pub fn new(row: impl Into<Bytes>) -> Self {
        Self { row: row.into(), version: None, columns: Vec::new() }
    }

    pub fn add(
        mut self,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Self {
        self.columns.push((Column::new(family, qualifier), value.into()));
        self
    }

    /// Explicit cell version. Engines without versions ignore it; engines with
    /// versions assign their own timestamp when it is absent.
    pub fn version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn row(&self) -> &Bytes {
        &self.row
    }

    pub fn cell_version(&self) -> Option<i64> {
        self.version
    }

    pub fn columns(&self) -> &[(Column, Bytes)] {
        &self.columns
    }

    pub fn into_parts(self) -> (Bytes, Option<i64>, Vec<(Column, Bytes)>) {
        (self.row, self.version, self.columns)
    }
}

// ════════════════════════════════════════════════════════════════
//  Backend adapter contract
// ════════════════════════════════════════════════════════════════

/// Capability set every key-value engine adapter provides for one table.
///
/// Row keys are compared as unsigned bytes; scans are forward-only over
/// `[start, stop)` with `stop = None` meaning the end of the table.
pub trait Backend: Send + Sync {
    /// Table name, for logs and errors.
    fn name(&self) -> &str;

    fn put(&self, put: Put) -> Result<(), StoreError>;

    /// Apply several puts. Engines may override to write them as one batch.
    fn put_all(&self, puts: Vec<Put>) -> Result<(), StoreError> {
        for put in puts {
            self.put(put)?;
        }
        Ok(())
    }

    fn scan(&self, start: &[u8], stop: Option<&[u8]>) -> Result<Box<dyn RowScanner>, StoreError>;

    /// Remove a whole row, every column and version.
    fn delete(&self, row: &[u8]) -> Result<(), StoreError>;

    /// Remove every row in `[start, stop)`, returning how many were removed.
    fn delete_range(&self, start: &[u8], stop: Option<&[u8]>) -> Result<u64, StoreError>;

    /// Release the table handle. Further calls fail with `ErrorKind::Closed`.
    fn close(&self) -> Result<(), StoreError>;
}

/// Open cursor over a scan range. Releasing it frees engine resources.
pub trait RowScanner: Send {
    fn next_row(&mut self) -> Result<Option<Row>, StoreError>;

    fn close(&mut self);
}

/// Opens table handles on one engine instance (the "connection").
pub trait TableProvider: Send + Sync {
    fn open_table(&self, name: &str) -> Result<Arc<dyn Backend>, StoreError>;
}

// ════════════════════════════════════════════════════════════════
//  BatchScanner: scanner refilled in fixed-size batches
// ════════════════════════════════════════════════════════════════

/// Where the next batch starts.
#[derive(Debug, Clone, Copy)]
pub enum ScanFrom<'a> {
    /// First batch: the scan start, inclusive.
    Start(&'a [u8]),
    /// Later batches: strictly after the last row already returned.
    After(&'a [u8]),
}

/// [`RowScanner`] that pulls up to `batch` rows at a time from `fetch`.
///
/// Engines supply `fetch(from, limit)`, returning rows in key order below the
/// scan's stop key. A short batch marks the range as exhausted.
pub struct BatchScanner<F> {
    fetch: F,
    start: Bytes,
    resume_after: Option<Bytes>,
    buffer: VecDeque<Row>,
    batch: usize,
    exhausted: bool,
    closed: bool,
}

impl<F> BatchScanner<F>
where
    F: FnMut(ScanFrom<'_>, usize) -> Result<Vec<Row>, StoreError> + Send,
{
    pub fn new(start: impl Into<Bytes>, batch: usize, fetch: F) -> Self {
        Self {
            fetch,
            start: start.into(),
            resume_after: None,
            buffer: VecDeque::new(),
            batch: batch.max(1),
            exhausted: false,
            closed: false,
        }
    }

    fn refill(&mut self) -> Result<(), StoreError> {
        let from = match &self.resume_after {
            Some(last) => ScanFrom::After(last),
            None => ScanFrom::Start(&self.start),
        };
        let rows = (self.fetch)(from, self.batch)?;
        if rows.len() < self.batch {
            self.exhausted = true;
        }
        if let Some(last) = rows.last() {
            self.resume_after = Some(last.key.clone());
        }
        self.buffer.extend(rows);
        Ok(())
    }
}

impl<F> RowScanner for BatchScanner<F>
where
    F: FnMut(ScanFrom<'_>, usize) -> Result<Vec<Row>, StoreError> + Send,
{
    fn next_row(&mut self) -> Result<Option<Row>, StoreError> {
        if self.closed {
            return Ok(None);
        }
        if self.buffer.is_empty() && !self.exhausted {
            self.refill()?;
        }
        Ok(self.buffer.pop_front())
    }

    fn close(&mut self) {
        self.closed = true;
        self.buffer.clear();
    }
}
