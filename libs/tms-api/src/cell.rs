//! Versioned cells and the compaction hook point of multi-version engines.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::StoreError;

/// One version of one column of one row.
///
/// `version` is the engine timestamp; transactional writes use the write
/// pointer of their transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub row: Bytes,
    pub family: Bytes,
    pub qualifier: Bytes,
    pub version: i64,
    pub value: Bytes,
}

impl Cell {
    /// Same row, family and qualifier (any version).
    pub fn same_column(&self, other: &Cell) -> bool {
        self.row == other.row && self.family == other.family && self.qualifier == other.qualifier
    }
}

/// Engine-internal scanner used while flushing or compacting a region.
///
/// Cells arrive sorted by row, family, qualifier, then version newest first.
pub trait CellScanner: Send {
    /// Clear `out` and fill it with the next batch, at most `limit` cells.
    ///
    /// Returns whether the scanner has more data after this batch; a batch may
    /// be non-empty on the final call.
    fn next_batch(&mut self, out: &mut Vec<Cell>, limit: Option<usize>) -> Result<bool, StoreError>;

    fn close(&mut self) -> Result<(), StoreError>;
}

/// Extension point invoked by a multi-version engine before it rewrites data.
///
/// A hook may wrap the engine scanner; the default passes it through untouched.
pub trait CompactionHook: Send + Sync {
    fn pre_flush(&self, region: &str, scanner: Box<dyn CellScanner>) -> Box<dyn CellScanner> {
        let _ = region;
        scanner
    }

    fn pre_compact(&self, region: &str, scanner: Box<dyn CellScanner>) -> Box<dyn CellScanner> {
        let _ = region;
        scanner
    }
}

/// [`CellScanner`] over an already sorted list of cells, one row per batch.
pub struct VecCellScanner {
    cells: VecDeque<Cell>,
}

impl VecCellScanner {
    pub fn new(cells: impl IntoIterator<Item = Cell>) -> Self {
        Self { cells: cells.into_iter().collect() }
    }
}

impl CellScanner for VecCellScanner {
    fn next_batch(&mut self, out: &mut Vec<Cell>, limit: Option<usize>) -> Result<bool, StoreError> {
        out.clear();
        let limit = limit.unwrap_or(usize::MAX);
        while out.len() < limit {
            let same_row = match (self.cells.front(), out.first()) {
                (Some(next), Some(first)) => next.row == first.row,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !same_row {
                break;
            }
            if let Some(cell) = self.cells.pop_front() {
                out.push(cell);
            }
        }
        Ok(!self.cells.is_empty())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.cells.clear();
        Ok(())
    }
}
