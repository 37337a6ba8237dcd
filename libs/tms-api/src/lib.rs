//! Contracts shared by the transactional message store: identifiers, entries,
//! transaction views, the backend adapter contract and row-key encoding.

pub mod backend;
pub mod cell;
pub mod entry;
pub mod error;
pub mod keys;
pub mod message_id;
pub mod table;
pub mod topic;
pub mod tx;

pub use backend::{Backend, BatchScanner, Column, Put, Row, RowScanner, ScanFrom, TableProvider};
pub use cell::{Cell, CellScanner, CompactionHook, VecCellScanner};
pub use entry::{MessageEntry, NewMessage, NewPayload, PayloadEntry};
pub use error::{ErrorKind, StoreError};
pub use message_id::MessageId;
pub use table::{
    CloseableIterator, MessageIter, MessageTable, MetadataTable, PayloadIter, PayloadTable,
    TopicProperties,
};
pub use topic::{NamespaceId, TopicId};
pub use tx::{Transaction, TransactionSnapshot, TransactionStateProvider};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
