use std::sync::{Arc, OnceLock};

use tms_api::{MessageTable, MetadataTable, PayloadTable, StoreError, TableProvider};
use tms_storage_columnar::ColumnarStore;
use tms_storage_embedded::EmbeddedStore;

use crate::config::{BackendConfig, StoreConfig};
use crate::{BackendMessageTable, BackendMetadataTable, BackendPayloadTable};

// ═══════════════════════════════════════════════════════════════
//  MessageStore
// ═══════════════════════════════════════════════════════════════

/// The configured engine plus one instance of each table over it.
///
/// Tables are created on first access and shared afterwards, so every
/// writer goes through the same write clock.
pub struct MessageStore {
    config: StoreConfig,
    provider: Arc<dyn TableProvider>,
    columnar: Option<Arc<ColumnarStore>>,
    messages: OnceLock<Arc<BackendMessageTable>>,
    payloads: OnceLock<Arc<BackendPayloadTable>>,
    metadata: OnceLock<Arc<BackendMetadataTable>>,
}

impl MessageStore {
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let (provider, columnar) = match &config.backend {
            BackendConfig::Columnar(cfg) => {
                let store = Arc::new(ColumnarStore::new(cfg.clone()));
                (store.clone() as Arc<dyn TableProvider>, Some(store))
            }
            BackendConfig::Embedded(cfg) => {
                let store = EmbeddedStore::open(cfg.clone())?;
                (Arc::new(store) as Arc<dyn TableProvider>, None)
            }
        };
        tracing::info!(backend = config.backend.kind(), "message store ready");
        Ok(Self {
            config,
            provider,
            columnar,
            messages: OnceLock::new(),
            payloads: OnceLock::new(),
            metadata: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn provider(&self) -> Arc<dyn TableProvider> {
        self.provider.clone()
    }

    /// The columnar engine, for registering compaction hooks and driving
    /// flushes. `None` on the embedded backend.
    pub fn columnar(&self) -> Option<&Arc<ColumnarStore>> {
        self.columnar.as_ref()
    }

    pub fn message_table(&self) -> Arc<dyn MessageTable> {
        self.messages
            .get_or_init(|| {
                Arc::new(BackendMessageTable::new(
                    self.provider.clone(),
                    &self.config.message_table,
                    &self.config.column_family,
                ))
            })
            .clone()
    }

    pub fn payload_table(&self) -> Arc<dyn PayloadTable> {
        self.payloads
            .get_or_init(|| {
                Arc::new(BackendPayloadTable::new(
                    self.provider.clone(),
                    &self.config.payload_table,
                    &self.config.column_family,
                ))
            })
            .clone()
    }

    pub fn metadata_table(&self) -> Arc<dyn MetadataTable> {
        self.metadata
            .get_or_init(|| {
                Arc::new(BackendMetadataTable::new(
                    self.provider.clone(),
                    &self.config.metadata_table,
                    &self.config.column_family,
                ))
            })
            .clone()
    }

    /// Close every table that was opened. All tables are attempted; the
    /// first failure is returned.
    pub fn close(&self) -> Result<(), StoreError> {
        let results = [
            self.messages.get().map(|t| t.close()),
            self.payloads.get().map(|t| t.close()),
            self.metadata.get().map(|t| t.close()),
        ];
        results.into_iter().flatten().collect::<Result<Vec<()>, _>>()?;
        Ok(())
    }
}
