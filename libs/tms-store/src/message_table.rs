use std::sync::Arc;

use bytes::Bytes;
use tms_api::keys::{
    decode_i64, decode_message_key, encode_message_key, encode_message_time_key, increment_key,
    stop_key_for_prefix,
};
use tms_api::{
    MessageEntry, MessageId, MessageIter, MessageTable, NewMessage, Put, Row, StoreError,
    TableProvider, TopicId, Transaction,
};

use crate::clock::WriteClock;
use crate::handle::LazyHandle;
use crate::iter::RowIter;
use crate::{PAYLOAD_QUALIFIER, TX_QUALIFIER};

/// [`MessageTable`] over any backend table.
///
/// Row key: `topic ++ be64(publish_ts) ++ be16(seq)`. Inline payloads live in
/// column `p`, the write pointer of transactional entries in column `t`.
/// Transactional cells carry the write pointer as their cell version.
pub struct BackendMessageTable {
    handle: LazyHandle,
    family: Bytes,
    clock: WriteClock,
}

impl BackendMessageTable {
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

    fn scan_from(
        &self,
        topic: &TopicId,
        start: Vec<u8>,
        limit: usize,
        tx: Option<&Transaction>,
    ) -> Result<MessageIter, StoreError> {
        let topic_bytes = topic.to_bytes();
        let stop = stop_key_for_prefix(&topic_bytes);
        let backend = self.handle.get()?;
        let scanner = backend
            .scan(&start, stop.as_deref())
            .map_err(|e| e.with_context(format!("scan topic {topic}")))?;

        let family = self.family.clone();
        let tx = tx.cloned();
        Ok(Box::new(RowIter::new(scanner, limit, move |row| {
            let entry = decode_entry(&family, row)?;
            Ok(entry.is_visible(tx.as_ref()).then_some(entry))
        })))
    }
}

fn decode_entry(family: &[u8], row: Row) -> Result<MessageEntry, StoreError> {
    let (publish_ts, seq) = decode_message_key(&row.key)?;
    let write_pointer = row
        .get(family, TX_QUALIFIER)
        .map(|v| decode_i64(v))
        .transpose()?;
    let payload = row.get(family, PAYLOAD_QUALIFIER).cloned();
    Ok(MessageEntry {
        id: MessageId::from_publish(publish_ts, seq),
        payload,
        write_pointer,
    })
}

impl MessageTable for BackendMessageTable {
    fn fetch(
        &self,
        topic: &TopicId,
        start_time: i64,
        limit: usize,
        tx: Option<&Transaction>,
    ) -> Result<MessageIter, StoreError> {
        let start = encode_message_time_key(&topic.to_bytes(), start_time.max(0));
        self.scan_from(topic, start, limit, tx)
    }

    fn fetch_from(
        &self,
        topic: &TopicId,
        start: &MessageId,
        inclusive: bool,
        limit: usize,
        tx: Option<&Transaction>,
    ) -> Result<MessageIter, StoreError> {
        let key = encode_message_key(&topic.to_bytes(), start.publish_timestamp(), start.sequence_id());
        let key = if inclusive {
            key
        } else {
            match increment_key(&key) {
                Some(next) => next,
                None => return Ok(Box::new(RowIter::<MessageEntry>::empty())),
            }
        };
        self.scan_from(topic, key, limit, tx)
    }

    fn store(&self, topic: &TopicId, entries: &[NewMessage]) -> Result<Vec<MessageId>, StoreError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let backend = self.handle.get()?;
        let slot = self.clock.allocate(entries.len())?;
        let topic_bytes = topic.to_bytes();

        let mut ids = Vec::with_capacity(entries.len());
        let mut puts = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            // allocate() guarantees the whole run fits in u16
            let seq = slot.first_sequence + i as u16;
            let mut put = Put::new(encode_message_key(&topic_bytes, slot.timestamp, seq));
            if let Some(payload) = entry.payload() {
                put = put.add(self.family.clone(), PAYLOAD_QUALIFIER, payload.clone());
            }
            if let Some(write_pointer) = entry.write_pointer() {
                put = put
                    .add(self.family.clone(), TX_QUALIFIER, write_pointer.to_be_bytes().to_vec())
                    .version(write_pointer);
            }
            puts.push(put);
            ids.push(MessageId::from_publish(slot.timestamp, seq));
        }

        backend
            .put_all(puts)
            .map_err(|e| e.with_context(format!("store to topic {topic}")))?;
        tracing::trace!(topic = %topic, count = ids.len(), ts = slot.timestamp, "stored messages");
        Ok(ids)
    }

    /// Scans the whole topic range and deletes every row written under
    /// `write_pointer`.
    fn delete(&self, topic: &TopicId, write_pointer: i64) -> Result<u64, StoreError> {
        let topic_bytes = topic.to_bytes();
        let stop = stop_key_for_prefix(&topic_bytes);
        let backend = self.handle.get()?;

        let mut doomed = Vec::new();
        let mut scanner = backend.scan(&topic_bytes, stop.as_deref())?;
        let scanned = loop {
            match scanner.next_row() {
                Ok(Some(row)) => match row.get(&self.family, TX_QUALIFIER).map(|v| decode_i64(v)) {
                    Some(Ok(wp)) if wp == write_pointer => doomed.push(row.key),
                    Some(Err(e)) => break Err(e),
                    _ => {}
                },
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        scanner.close();
        scanned.map_err(|e| e.with_context(format!("rollback scan of topic {topic}")))?;

        for row in &doomed {
            backend.delete(row)?;
        }
        tracing::debug!(topic = %topic, write_pointer, rows = doomed.len(), "rolled back messages");
        Ok(doomed.len() as u64)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.handle.close()
    }
}
