use anyhow::Result;
use bytes::Bytes;
use tempfile::TempDir;
use tms_api::{ErrorKind, Put, Row, TableProvider};
use tms_storage_embedded::{EmbeddedConfig, EmbeddedStore};

fn open(dir: &TempDir) -> Result<EmbeddedStore> {
    let mut config = EmbeddedConfig::new(dir.path());
    config.scan_batch = 2;
    Ok(EmbeddedStore::open(config)?)
}

fn scan_all(store: &EmbeddedStore, table: &str, start: &[u8], stop: Option<&[u8]>) -> Result<Vec<Row>> {
    let backend = store.open_table(table)?;
    let mut scanner = backend.scan(start, stop)?;
    let mut rows = Vec::new();
    while let Some(row) = scanner.next_row()? {
        rows.push(row);
    }
    Ok(rows)
}

#[test]
fn puts_merge_columns_of_a_row() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open(&dir)?;
    let table = store.open_table("t")?;
    table.put(Put::new("r").add("d", "p", "payload"))?;
    table.put(Put::new("r").add("d", "t", "wp"))?;
    table.put(Put::new("r").add("d", "p", "replaced"))?;

    let rows = scan_all(&store, "t", b"", None)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get(b"d", b"p"), Some(&Bytes::from_static(b"replaced")));
    assert_eq!(rows[0].get(b"d", b"t"), Some(&Bytes::from_static(b"wp")));
    Ok(())
}

#[test]
fn scan_pages_through_bounded_range() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open(&dir)?;
    let table = store.open_table("t")?;
    table.put_all(
        ["a", "b", "c", "d", "e", "f"]
            .into_iter()
            .map(|k| Put::new(k).add("d", "p", k))
            .collect(),
    )?;

    let keys: Vec<Bytes> = scan_all(&store, "t", b"b", Some(b"f"))?
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(keys, vec!["b", "c", "d", "e"]);
    assert!(scan_all(&store, "t", b"x", Some(b"b"))?.is_empty());
    Ok(())
}

#[test]
fn delete_and_delete_range() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open(&dir)?;
    let table = store.open_table("t")?;
    for key in ["k1", "k2", "k3", "k4"] {
        table.put(Put::new(key).add("d", "p", key))?;
    }
    table.delete(b"k1")?;
    assert_eq!(table.delete_range(b"k2", Some(b"k4"))?, 2);
    assert_eq!(table.delete_range(b"k9", Some(b"k1"))?, 0);

    let rows = scan_all(&store, "t", b"", None)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, "k4");
    Ok(())
}

#[test]
fn tables_are_isolated() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open(&dir)?;
    store.open_table("one")?.put(Put::new("r").add("d", "p", "1"))?;
    assert!(scan_all(&store, "two", b"", None)?.is_empty());
    Ok(())
}

#[test]
fn data_survives_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    {
        let store = open(&dir)?;
        let table = store.open_table("t")?;
        table.put(Put::new("r").add("d", "p", "kept"))?;
        table.close()?;
    }
    let store = open(&dir)?;
    let rows = scan_all(&store, "t", b"", None)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get(b"d", b"p"), Some(&Bytes::from_static(b"kept")));
    Ok(())
}

#[test]
fn closed_handle_and_bad_names_are_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open(&dir)?;
    let table = store.open_table("t")?;
    table.close()?;
    assert_eq!(table.scan(b"", None).err().map(|e| e.kind()), Some(ErrorKind::Closed));
    assert_eq!(
        store.open_table("bad name").err().map(|e| e.kind()),
        Some(ErrorKind::Config)
    );
    Ok(())
}
