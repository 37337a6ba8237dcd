use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tms_api::{Backend, BatchScanner, Put, RowScanner, StoreError};

use crate::Region;

/// Client handle on one region. Closing the handle leaves the region intact.
pub struct ColumnarTable {
    region: Arc<Region>,
    scan_caching: usize,
    closed: AtomicBool,
}

impl ColumnarTable {
    pub(crate) fn new(region: Arc<Region>, scan_caching: usize) -> Self {
        Self {
            region,
            scan_caching,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::closed(format!(
                "table '{}' is closed",
                self.region.name()
            )));
        }
        Ok(())
    }
}

impl Backend for ColumnarTable {
    fn name(&self) -> &str {
        self.region.name()
    }

    fn put(&self, put: Put) -> Result<(), StoreError> {
        self.put_all(vec![put])
    }

    fn put_all(&self, puts: Vec<Put>) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.region.put(puts);
        Ok(())
    }

    fn scan(&self, start: &[u8], stop: Option<&[u8]>) -> Result<Box<dyn RowScanner>, StoreError> {
        self.ensure_open()?;
        let region = self.region.clone();
        let stop = stop.map(Bytes::copy_from_slice);
        let start = Bytes::copy_from_slice(start);
        Ok(Box::new(BatchScanner::new(
            start,
            self.scan_caching,
            move |from, limit| Ok(region.fetch_rows(from, stop.as_deref(), limit)),
        )))
    }

    fn delete(&self, row: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.region.delete_row(row);
        Ok(())
    }

    fn delete_range(&self, start: &[u8], stop: Option<&[u8]>) -> Result<u64, StoreError> {
        self.ensure_open()?;
        Ok(self.region.delete_range(start, stop))
    }

    fn close(&self) -> Result<(), StoreError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(table = %self.region.name(), "closed columnar table handle");
        }
        Ok(())
    }
}
