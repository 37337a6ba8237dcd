//! Message, payload and metadata tables over any [`tms_api::Backend`].
//!
//! The same table code runs on both storage engines: rows are built with
//! the shared key encoder and read back through visibility-filtering
//! iterators.

mod clock;
mod config;
mod handle;
mod iter;
mod message_table;
mod metadata_table;
mod payload_table;
mod store;

pub use clock::{Clock, ManualClock, SystemClock, WriteClock, WriteSlot};
pub use config::{BackendConfig, StoreConfig};
pub use handle::LazyHandle;
pub use iter::RowIter;
pub use message_table::BackendMessageTable;
pub use metadata_table::BackendMetadataTable;
pub use payload_table::BackendPayloadTable;
pub use store::MessageStore;

/// Inline payload of a message row.
pub const PAYLOAD_QUALIFIER: &[u8] = b"p";
/// Big-endian write pointer of a transactional message row.
pub const TX_QUALIFIER: &[u8] = b"t";
/// Payload bytes of a payload-table row.
pub const CONTENT_QUALIFIER: &[u8] = b"c";
/// JSON-encoded topic properties of a metadata row.
pub const PROPERTIES_QUALIFIER: &[u8] = b"m";
