use std::sync::Arc;

use bytes::Bytes;
use tms_api::keys::{
    decode_payload_key, encode_payload_key, encode_payload_prefix, increment_key,
    stop_key_for_prefix,
};
use tms_api::{
    MessageId, NewPayload, PayloadEntry, PayloadIter, PayloadTable, Put, StoreError,
    TableProvider, TopicId, Transaction,
};

use crate::CONTENT_QUALIFIER;
use crate::clock::WriteClock;
use crate::handle::LazyHandle;
use crate::iter::RowIter;

/// [`PayloadTable`] over any backend table.
///
/// Row key: `topic ++ be64(write_ptr) ++ be64(write_ts) ++ be16(seq)`, so all
/// payloads of one transaction form one contiguous key range.
pub struct BackendPayloadTable {
    handle: LazyHandle,
    family: Bytes,
    clock: WriteClock,
}

impl BackendPayloadTable {
    pub fn new(provider: Arc<dyn TableProvider>, table: &str, family: &str) -> Self {
        Self::with_clock(provider, table, family, WriteClock::system())
    }

    pub fn with_clock(
        provider: Arc<dyn TableProvider>,
        table: &str,
        family: &str,
        clock: WriteClock,
    ) -> Self {
        Self {
            handle: LazyHandle::new(provider, table),
            family: Bytes::copy_from_slice(family.as_bytes()),
            clock,
        }
    }
}

impl PayloadTable for BackendPayloadTable {
    fn fetch(
        &self,
        topic: &TopicId,
        write_pointer: i64,
        start: &MessageId,
        inclusive: bool,
        limit: usize,
        tx: Option<&Transaction>,
    ) -> Result<PayloadIter, StoreError> {
        if tx.is_some_and(|tx| !tx.is_visible(write_pointer)) {
            return Ok(Box::new(RowIter::<PayloadEntry>::empty()));
        }

        let topic_bytes = topic.to_bytes();
        let prefix = encode_payload_prefix(&topic_bytes, write_pointer);
        let stop = stop_key_for_prefix(&prefix);
        let key = encode_payload_key(
            &topic_bytes,
            write_pointer,
            start.write_timestamp(),
            start.payload_sequence_id(),
        );
        let key = if inclusive {
            key
        } else {
            match increment_key(&key) {
                Some(next) => next,
                None => return Ok(Box::new(RowIter::<PayloadEntry>::empty())),
            }
        };

        let backend = self.handle.get()?;
        let scanner = backend
            .scan(&key, stop.as_deref())
            .map_err(|e| e.with_context(format!("scan payloads of {topic}@{write_pointer}")))?;
        let family = self.family.clone();
        Ok(Box::new(RowIter::new(scanner, limit, move |row| {
            let (write_pointer, write_timestamp, payload_sequence_id) = decode_payload_key(&row.key)?;
            let payload = row.get(&family, CONTENT_QUALIFIER).cloned().ok_or_else(|| {
                StoreError::format(format!(
                    "payload row at write pointer {write_pointer} has no content column"
                ))
            })?;
            Ok(Some(PayloadEntry {
                write_pointer,
                write_timestamp,
                payload_sequence_id,
                payload,
            }))
        })))
    }

    fn store(&self, topic: &TopicId, entries: &[NewPayload]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let backend = self.handle.get()?;
        let slot = self.clock.allocate(entries.len())?;
        let topic_bytes = topic.to_bytes();

        let puts = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let seq = slot.first_sequence + i as u16;
                let key = encode_payload_key(&topic_bytes, entry.write_pointer, slot.timestamp, seq);
                Put::new(key)
                    .add(self.family.clone(), CONTENT_QUALIFIER, entry.payload.clone())
                    .version(entry.write_pointer)
            })
            .collect();
        backend
            .put_all(puts)
            .map_err(|e| e.with_context(format!("store payloads to topic {topic}")))?;
        tracing::trace!(topic = %topic, count = entries.len(), "stored payloads");
        Ok(())
    }

    fn delete(&self, topic: &TopicId, write_pointer: i64) -> Result<u64, StoreError> {
        let prefix = encode_payload_prefix(&topic.to_bytes(), write_pointer);
        let stop = stop_key_for_prefix(&prefix);
        let removed = self
            .handle
            .get()?
            .delete_range(&prefix, stop.as_deref())
            .map_err(|e| e.with_context(format!("rollback payloads of topic {topic}")))?;
        tracing::debug!(topic = %topic, write_pointer, rows = removed, "rolled back payloads");
        Ok(removed)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.handle.close()
    }
}
