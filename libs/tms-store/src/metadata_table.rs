use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tms_api::keys::stop_key_for_prefix;
use tms_api::{
    Backend, MetadataTable, NamespaceId, Put, Row, StoreError, TableProvider, TopicId,
    TopicProperties,
};

use crate::PROPERTIES_QUALIFIER;
use crate::handle::LazyHandle;

/// Topic registry stored in its own backend table.
///
/// Row key is the topic bytes; properties are one JSON column.
pub struct BackendMetadataTable {
    handle: LazyHandle,
    family: Bytes,
    /// Makes the exists-check and write of create/delete one step.
    mutation: Mutex<()>,
}

impl BackendMetadataTable {
    pub fn new(provider: Arc<dyn TableProvider>, table: &str, family: &str) -> Self {
        Self {
            handle: LazyHandle::new(provider, table),
            family: Bytes::copy_from_slice(family.as_bytes()),
            mutation: Mutex::new(()),
        }
    }

    fn lock_mutation(&self) -> MutexGuard<'_, ()> {
        self.mutation.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("metadata lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn decode_properties(&self, row: &Row) -> Result<TopicProperties, StoreError> {
        match row.get(&self.family, PROPERTIES_QUALIFIER) {
            Some(json) => Ok(serde_json::from_slice(json)?),
            None => Ok(TopicProperties::new()),
        }
    }
}

/// Point lookup through a one-row scan.
fn read_row(backend: &dyn Backend, key: &[u8]) -> Result<Option<Row>, StoreError> {
    let mut stop = key.to_vec();
    stop.push(0);
    let mut scanner = backend.scan(key, Some(&stop))?;
    let row = scanner.next_row();
    scanner.close();
    Ok(row?.filter(|r| r.key.as_ref() == key))
}

impl MetadataTable for BackendMetadataTable {
    fn create_topic(&self, topic: &TopicId, properties: &TopicProperties) -> Result<(), StoreError> {
        let backend = self.handle.get()?;
        let key = topic.to_bytes();
        let json = serde_json::to_vec(properties)?;

        let _guard = self.lock_mutation();
        if read_row(backend.as_ref(), &key)?.is_some() {
            return Err(StoreError::already_exists(format!("topic {topic} already exists")));
        }
        backend.put(Put::new(key).add(self.family.clone(), PROPERTIES_QUALIFIER, json))?;
        tracing::debug!(topic = %topic, "created topic");
        Ok(())
    }

    fn get_properties(&self, topic: &TopicId) -> Result<Option<TopicProperties>, StoreError> {
        let backend = self.handle.get()?;
        read_row(backend.as_ref(), &topic.to_bytes())?
            .map(|row| self.decode_properties(&row))
            .transpose()
            .map_err(|e| e.with_context(format!("properties of topic {topic}")))
    }

    fn delete_topic(&self, topic: &TopicId) -> Result<(), StoreError> {
        let backend = self.handle.get()?;
        let key = topic.to_bytes();

        let _guard = self.lock_mutation();
        if read_row(backend.as_ref(), &key)?.is_none() {
            return Err(StoreError::not_found(format!("topic {topic} does not exist")));
        }
        backend.delete(&key)?;
        tracing::debug!(topic = %topic, "deleted topic");
        Ok(())
    }

    fn list_topics(&self, namespace: &NamespaceId) -> Result<Vec<TopicId>, StoreError> {
        let backend = self.handle.get()?;
        let prefix = namespace.to_bytes();
        let stop = stop_key_for_prefix(&prefix);

        let mut scanner = backend.scan(&prefix, stop.as_deref())?;
        let mut topics = Vec::new();
        let scanned = loop {
            match scanner.next_row() {
                Ok(Some(row)) => match TopicId::from_bytes(&row.key) {
                    Ok(topic) => topics.push(topic),
                    Err(e) => break Err(e),
                },
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        scanner.close();
        scanned?;
        Ok(topics)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.handle.close()
    }
}
