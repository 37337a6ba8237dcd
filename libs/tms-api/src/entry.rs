use bytes::Bytes;

use crate::message_id::MessageId;
use crate::tx::Transaction;

/// A message handed to `MessageTable::store`.
///
/// Either carries its payload inline or references payload rows stored in the
/// payload table under its transaction write pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    payload: Option<Bytes>,
    write_pointer: Option<i64>,
}

impl NewMessage {
    /// Non-transactional inline message, always visible.
    pub fn inline(payload: impl Into<Bytes>) -> Self {
        Self { payload: Some(payload.into()), write_pointer: None }
    }

    /// Inline message published under a transaction.
    pub fn transactional(payload: impl Into<Bytes>, write_pointer: i64) -> Self {
        Self { payload: Some(payload.into()), write_pointer: Some(write_pointer) }
    }

    /// Reference to payload rows of `write_pointer` in the payload table.
    pub fn payload_reference(write_pointer: i64) -> Self {
        Self { payload: None, write_pointer: Some(write_pointer) }
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn write_pointer(&self) -> Option<i64> {
        self.write_pointer
    }

    pub fn is_payload_reference(&self) -> bool {
        self.payload.is_none()
    }
}

/// A message read back from the message table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub id: MessageId,
    pub payload: Option<Bytes>,
    pub write_pointer: Option<i64>,
}

impl MessageEntry {
    pub fn is_payload_reference(&self) -> bool {
        self.payload.is_none()
    }

    pub fn is_transactional(&self) -> bool {
        self.write_pointer.is_some()
    }

    pub fn publish_timestamp(&self) -> i64 {
        self.id.publish_timestamp()
    }

    pub fn sequence_id(&self) -> u16 {
        self.id.sequence_id()
    }

    /// Visibility filter applied by every snapshot-aware fetch path.
    ///
    /// Non-transactional entries are always visible; transactional ones only
    /// when their write is visible to `tx`. No transaction means no filtering.
    pub fn is_visible(&self, tx: Option<&Transaction>) -> bool {
        match (tx, self.write_pointer) {
            (Some(tx), Some(write_pointer)) => tx.is_visible(write_pointer),
            _ => true,
        }
    }
}

/// An overflow payload handed to `PayloadTable::store`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayload {
    pub write_pointer: i64,
    pub payload: Bytes,
}

impl NewPayload {
    pub fn new(write_pointer: i64, payload: impl Into<Bytes>) -> Self {
        Self { write_pointer, payload: payload.into() }
    }
}

/// A payload row read back from the payload table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    pub write_pointer: i64,
    pub write_timestamp: i64,
    pub payload_sequence_id: u16,
    pub payload: Bytes,
}

impl PayloadEntry {
    /// Resumption token for this payload row under message `message`.
    pub fn message_id(&self, message: &MessageId) -> MessageId {
        MessageId::new(
            message.publish_timestamp(),
            message.sequence_id(),
            self.write_timestamp,
            self.payload_sequence_id,
        )
    }
}
