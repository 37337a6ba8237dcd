#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;
use tms_api::{MessageEntry, MessageIter, PayloadEntry, PayloadIter, TableProvider, TopicId};
use tms_storage_columnar::{ColumnarConfig, ColumnarStore};
use tms_storage_embedded::{EmbeddedConfig, EmbeddedStore};

/// A backend under test; keeps its temp dir alive.
pub struct Engine {
    pub name: &'static str,
    pub provider: Arc<dyn TableProvider>,
    _dir: Option<TempDir>,
}

/// Both engines, with small scan batches so paging is exercised.
pub fn engines() -> Result<Vec<Engine>> {
    let columnar = Engine {
        name: "columnar",
        provider: Arc::new(ColumnarStore::new(ColumnarConfig { scan_caching: 3 })),
        _dir: None,
    };

    let dir = TempDir::new()?;
    let mut config = EmbeddedConfig::new(dir.path());
    config.scan_batch = 3;
    let embedded = Engine {
        name: "embedded",
        provider: Arc::new(EmbeddedStore::open(config)?),
        _dir: Some(dir),
    };
    Ok(vec![columnar, embedded])
}

pub fn topic(name: &str) -> TopicId {
    name.parse().expect("valid topic")
}

pub fn drain_messages(iter: MessageIter) -> Result<Vec<MessageEntry>> {
    Ok(iter.collect::<Result<Vec<_>, _>>()?)
}

pub fn drain_payloads(iter: PayloadIter) -> Result<Vec<PayloadEntry>> {
    Ok(iter.collect::<Result<Vec<_>, _>>()?)
}
