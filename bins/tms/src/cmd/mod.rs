pub mod fetch;
pub mod publish;
pub mod rollback;
pub mod topic;

use tms_api::{StoreError, TopicId};
use tms_store::MessageStore;

use crate::error::CliError;

pub(crate) fn parse_topic(name: &str) -> Result<TopicId, CliError> {
    name.parse()
        .map_err(|e: StoreError| CliError::Argument(format!("topic '{name}': {}", e.message())))
}

/// Data commands only run against registered topics.
pub(crate) fn require_topic(store: &MessageStore, topic: &TopicId) -> Result<(), CliError> {
    match store.metadata_table().get_properties(topic)? {
        Some(_) => Ok(()),
        None => Err(StoreError::not_found(format!("topic '{topic}' does not exist")).into()),
    }
}
