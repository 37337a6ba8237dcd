use std::collections::BTreeMap;

use crate::entry::{MessageEntry, NewMessage, NewPayload, PayloadEntry};
use crate::error::StoreError;
use crate::message_id::MessageId;
use crate::topic::{NamespaceId, TopicId};
use crate::tx::Transaction;

/// Iterator holding an open backend cursor.
///
/// Closes itself on exhaustion or when its limit is reached; `close` (or drop)
/// releases the cursor early.
pub trait CloseableIterator: Iterator + Send {
    fn close(&mut self);
}

pub type MessageIter = Box<dyn CloseableIterator<Item = Result<MessageEntry, StoreError>>>;
pub type PayloadIter = Box<dyn CloseableIterator<Item = Result<PayloadEntry, StoreError>>>;

pub type TopicProperties = BTreeMap<String, String>;

/// Append-only store of message entries per topic, ordered by write time.
///
/// `store` calls on one instance are serialized internally. Entries skipped by
/// the visibility filter do not count against `limit`.
pub trait MessageTable: Send + Sync {
    /// Forward scan from the first message published at or after `start_time`.
    fn fetch(
        &self,
        topic: &TopicId,
        start_time: i64,
        limit: usize,
        tx: Option<&Transaction>,
    ) -> Result<MessageIter, StoreError>;

    /// Resume from an exact message id; `inclusive = false` starts just after it.
    fn fetch_from(
        &self,
        topic: &TopicId,
        start: &MessageId,
        inclusive: bool,
        limit: usize,
        tx: Option<&Transaction>,
    ) -> Result<MessageIter, StoreError>;

    /// Store `entries` under one write timestamp with increasing sequence ids,
    /// returning the id assigned to each entry in order.
    fn store(&self, topic: &TopicId, entries: &[NewMessage]) -> Result<Vec<MessageId>, StoreError>;

    /// Remove every entry of `topic` written under `write_pointer`.
    fn delete(&self, topic: &TopicId, write_pointer: i64) -> Result<u64, StoreError>;

    fn close(&self) -> Result<(), StoreError>;
}

/// Append-only store of overflow payloads keyed by topic and transaction.
pub trait PayloadTable: Send + Sync {
    /// Forward scan over the payload rows of one transaction, starting at the
    /// payload part of `start`. When `tx` is given and cannot see
    /// `write_pointer`, nothing is returned.
    fn fetch(
        &self,
        topic: &TopicId,
        write_pointer: i64,
        start: &MessageId,
        inclusive: bool,
        limit: usize,
        tx: Option<&Transaction>,
    ) -> Result<PayloadIter, StoreError>;

    fn store(&self, topic: &TopicId, entries: &[NewPayload]) -> Result<(), StoreError>;

    /// Remove the whole key range of `(topic, write_pointer)`.
    fn delete(&self, topic: &TopicId, write_pointer: i64) -> Result<u64, StoreError>;

    fn close(&self) -> Result<(), StoreError>;
}

/// Topic registry: topic existence and properties.
pub trait MetadataTable: Send + Sync {
    fn create_topic(&self, topic: &TopicId, properties: &TopicProperties) -> Result<(), StoreError>;

    /// `None` if the topic does not exist.
    fn get_properties(&self, topic: &TopicId) -> Result<Option<TopicProperties>, StoreError>;

    fn delete_topic(&self, topic: &TopicId) -> Result<(), StoreError>;

    fn list_topics(&self, namespace: &NamespaceId) -> Result<Vec<TopicId>, StoreError>;

    fn close(&self) -> Result<(), StoreError>;
}
