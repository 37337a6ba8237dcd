use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use bytes::Bytes;
use tms_api::{Cell, CellScanner, CompactionHook, ErrorKind, Put, Row, StoreError, TableProvider};
use tms_storage_columnar::{ColumnarConfig, ColumnarStore};

fn collect(store: &ColumnarStore, table: &str, start: &[u8], stop: Option<&[u8]>) -> Result<Vec<Row>> {
    let backend = store.open_table(table)?;
    let mut scanner = backend.scan(start, stop)?;
    let mut rows = Vec::new();
    while let Some(row) = scanner.next_row()? {
        rows.push(row);
    }
    scanner.close();
    Ok(rows)
}

#[test]
fn scan_returns_newest_version_across_memstore_and_store() -> Result<()> {
    let store = ColumnarStore::default();
    let table = store.open_table("t")?;
    table.put(Put::new("r1").add("d", "p", "old").version(1))?;
    store.flush("t")?;
    table.put(Put::new("r1").add("d", "p", "new").version(2))?;

    let rows = collect(&store, "t", b"", None)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get(b"d", b"p"), Some(&Bytes::from_static(b"new")));

    let region = store.region("t").expect("region exists");
    assert_eq!(region.versions(b"r1", b"d", b"p"), vec![2, 1]);
    Ok(())
}

#[test]
fn scan_respects_bounds_and_small_caching() -> Result<()> {
    let store = ColumnarStore::new(ColumnarConfig { scan_caching: 2 });
    let table = store.open_table("t")?;
    for key in ["a", "b", "c", "d", "e"] {
        table.put(Put::new(key).add("d", "p", key))?;
    }

    let keys: Vec<Bytes> = collect(&store, "t", b"b", Some(b"e"))?
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(keys, vec!["b", "c", "d"]);

    assert!(collect(&store, "t", b"z", Some(b"a"))?.is_empty());
    Ok(())
}

#[test]
fn delete_removes_all_versions_of_a_row() -> Result<()> {
    let store = ColumnarStore::default();
    let table = store.open_table("t")?;
    table.put(Put::new("r").add("d", "p", "v1").version(1))?;
    store.flush("t")?;
    table.put(Put::new("r").add("d", "p", "v2").version(2))?;
    table.put(Put::new("r0").add("d", "p", "keep"))?;

    table.delete(b"r")?;
    let rows = collect(&store, "t", b"", None)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, "r0");
    Ok(())
}

#[test]
fn delete_range_counts_rows() -> Result<()> {
    let store = ColumnarStore::default();
    let table = store.open_table("t")?;
    for key in ["k1", "k2", "k3"] {
        table.put(Put::new(key).add("d", "a", "x").add("d", "b", "y"))?;
    }
    assert_eq!(table.delete_range(b"k1", Some(b"k3"))?, 2);
    assert_eq!(collect(&store, "t", b"", None)?.len(), 1);
    Ok(())
}

#[test]
fn closed_handle_rejects_operations() -> Result<()> {
    let store = ColumnarStore::default();
    let table = store.open_table("t")?;
    table.close()?;
    table.close()?;
    let err = table.put(Put::new("r").add("d", "p", "v")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Closed);

    // A fresh handle on the same table still works.
    store.open_table("t")?.put(Put::new("r").add("d", "p", "v"))?;
    Ok(())
}

#[test]
fn maintenance_on_unknown_table_is_not_found() {
    let store = ColumnarStore::default();
    assert_eq!(store.flush("missing").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.compact("missing").unwrap_err().kind(), ErrorKind::NotFound);
}

// ── Hooks ──

/// Drops every cell with an odd version.
struct DropOdd {
    flushes: AtomicUsize,
    compactions: AtomicUsize,
}

struct DropOddScanner {
    inner: Box<dyn CellScanner>,
}

impl CellScanner for DropOddScanner {
    fn next_batch(&mut self, out: &mut Vec<Cell>, limit: Option<usize>) -> Result<bool, StoreError> {
        let more = self.inner.next_batch(out, limit)?;
        out.retain(|c| c.version % 2 == 0);
        Ok(more)
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.inner.close()
    }
}

impl CompactionHook for DropOdd {
    fn pre_flush(&self, _region: &str, scanner: Box<dyn CellScanner>) -> Box<dyn CellScanner> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Box::new(DropOddScanner { inner: scanner })
    }

    fn pre_compact(&self, _region: &str, scanner: Box<dyn CellScanner>) -> Box<dyn CellScanner> {
        self.compactions.fetch_add(1, Ordering::SeqCst);
        Box::new(DropOddScanner { inner: scanner })
    }
}

#[test]
fn hooks_filter_flush_and_compaction() -> Result<()> {
    let store = ColumnarStore::default();
    let hook = Arc::new(DropOdd {
        flushes: AtomicUsize::new(0),
        compactions: AtomicUsize::new(0),
    });
    store.register_hook(hook.clone());

    let table = store.open_table("t")?;
    table.put(Put::new("r").add("d", "p", "v1").version(1))?;
    table.put(Put::new("r").add("d", "p", "v2").version(2))?;
    store.flush("t")?;

    let region = store.region("t").expect("region exists");
    assert_eq!(region.memstore_len(), 0);
    assert_eq!(region.versions(b"r", b"d", b"p"), vec![2]);

    store.compact("t")?;
    assert_eq!(region.store_len(), 1);
    assert_eq!(hook.flushes.load(Ordering::SeqCst), 1);
    assert_eq!(hook.compactions.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn flushing_an_empty_memstore_skips_hooks() -> Result<()> {
    let store = ColumnarStore::default();
    let hook = Arc::new(DropOdd {
        flushes: AtomicUsize::new(0),
        compactions: AtomicUsize::new(0),
    });
    store.register_hook(hook.clone());
    store.open_table("t")?;
    store.flush("t")?;
    assert_eq!(hook.flushes.load(Ordering::SeqCst), 0);
    Ok(())
}
