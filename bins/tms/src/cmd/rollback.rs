use std::io::Write;

use tms_store::MessageStore;

use crate::config::RollbackArgs;
use crate::error::CliError;

use super::{parse_topic, require_topic};

pub fn run(store: &MessageStore, args: RollbackArgs) -> Result<(), CliError> {
    let topic = parse_topic(&args.topic)?;
    require_topic(store, &topic)?;

    let messages = store.message_table().delete(&topic, args.write_pointer)?;
    let payloads = store.payload_table().delete(&topic, args.write_pointer)?;
    tracing::info!(
        topic = %topic,
        write_pointer = args.write_pointer,
        messages,
        payloads,
        "rolled back transaction"
    );

    let summary = serde_json::json!({ "messages": messages, "payloads": payloads });
    writeln!(std::io::stdout().lock(), "{summary}")?;
    Ok(())
}
