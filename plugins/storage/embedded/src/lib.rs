//! Embedded local-store adapter backed by fjall.
//!
//! Every table is one fjall partition inside a single keyspace. A row is a
//! single key whose value packs all of its columns; only the newest value of
//! each column is kept.

mod codec;
mod config;
mod store;

pub use config::EmbeddedConfig;
pub use store::{EmbeddedStore, EmbeddedTable};
