use std::sync::Arc;

use tms_api::{Cell, CellScanner, StoreError, TransactionSnapshot};

use crate::filter::{FilterState, filter_cells};
use crate::metrics::JanitorMetrics;

/// Wraps an engine's flush or compaction scanner and filters every batch
/// through [`filter_cells`].
pub struct DataJanitorScanner {
    inner: Box<dyn CellScanner>,
    snapshot: Arc<TransactionSnapshot>,
    region: String,
    state: FilterState,
    pulled: Vec<Cell>,
    metrics: Option<Arc<JanitorMetrics>>,
    closed: bool,
}

impl DataJanitorScanner {
    pub fn new(
        inner: Box<dyn CellScanner>,
        snapshot: Arc<TransactionSnapshot>,
        region: impl Into<String>,
    ) -> Self {
        let region = region.into();
        tracing::info!(
            region = %region,
            oldest_in_use_read_pointer = snapshot.oldest_in_use_read_pointer,
            invalid = snapshot.invalid.len(),
            "created janitor scanner"
        );
        Self {
            inner,
            snapshot,
            region,
            state: FilterState::default(),
            pulled: Vec::new(),
            metrics: None,
            closed: false,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<JanitorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn stats(&self) -> crate::JanitorStats {
        self.state.stats
    }
}

impl CellScanner for DataJanitorScanner {
    /// Re-pulls while filtering leaves the batch empty but the wrapped
    /// scanner still has data, so callers never see a false end of data.
    fn next_batch(&mut self, out: &mut Vec<Cell>, limit: Option<usize>) -> Result<bool, StoreError> {
        out.clear();
        loop {
            self.pulled.clear();
            let has_more = self.inner.next_batch(&mut self.pulled, limit)?;
            filter_cells(self.pulled.drain(..), &self.snapshot, &mut self.state, out);
            if !out.is_empty() || !has_more {
                return Ok(has_more);
            }
        }
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if !self.closed {
            self.closed = true;
            let stats = self.state.stats;
            tracing::info!(
                region = %self.region,
                invalid = stats.invalid,
                stale = stats.stale,
                "janitor filtered out invalid/old cells"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_pass(stats);
            }
        }
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tms_api::VecCellScanner;

    use super::*;

    fn cell(row: &'static str, version: i64) -> Cell {
        Cell {
            row: Bytes::from_static(row.as_bytes()),
            family: Bytes::from_static(b"d"),
            qualifier: Bytes::from_static(b"p"),
            version,
            value: Bytes::new(),
        }
    }

    #[test]
    fn fully_filtered_batches_are_skipped_not_reported_as_end() {
        let inner = VecCellScanner::new([cell("a", 7), cell("b", 7), cell("c", 9)]);
        let snapshot = Arc::new(TransactionSnapshot::new(0, [7]));
        let mut scanner = DataJanitorScanner::new(Box::new(inner), snapshot, "r1");

        let mut out = Vec::new();
        let more = scanner.next_batch(&mut out, None).unwrap();
        assert!(!more);
        assert_eq!(out, vec![cell("c", 9)]);
        assert_eq!(scanner.stats().invalid, 2);
        scanner.close().unwrap();
    }

    #[test]
    fn close_records_metrics_once() {
        let metrics = Arc::new(JanitorMetrics::default());
        let inner = VecCellScanner::new([cell("a", 3), cell("a", 1)]);
        let snapshot = Arc::new(TransactionSnapshot::new(5, []));
        let mut scanner =
            DataJanitorScanner::new(Box::new(inner), snapshot, "r1").with_metrics(metrics.clone());

        let mut out = Vec::new();
        scanner.next_batch(&mut out, None).unwrap();
        scanner.close().unwrap();
        scanner.close().unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.stale, 1);
        assert_eq!(snap.passes, 1);
    }
}
