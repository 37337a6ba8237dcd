//! Compaction-time garbage collection of transactional cells.
//!
//! [`TransactionDataJanitor`] hooks into an engine's flush and compaction
//! scanners. With a current [`TransactionSnapshot`](tms_api::TransactionSnapshot)
//! from the [`TransactionStateCache`] it drops cells written by invalid
//! transactions and versions no active transaction can still read.

mod cache;
mod config;
mod filter;
mod hook;
mod metrics;
mod provider;
mod scanner;

pub use cache::TransactionStateCache;
pub use config::JanitorConfig;
pub use filter::{FilterState, JanitorStats, filter_cells};
pub use hook::TransactionDataJanitor;
pub use metrics::{JanitorMetrics, MetricsSnapshot};
pub use provider::InMemoryTransactionState;
pub use scanner::DataJanitorScanner;
