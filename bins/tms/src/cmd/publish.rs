use std::io::Write;

use tms_api::{NewMessage, NewPayload};
use tms_store::MessageStore;

use crate::config::PublishArgs;
use crate::error::CliError;

use super::{parse_topic, require_topic};

pub fn run(store: &MessageStore, args: PublishArgs) -> Result<(), CliError> {
    let topic = parse_topic(&args.topic)?;
    require_topic(store, &topic)?;

    let entries = match (args.tx, args.payload_ref) {
        (Some(write_pointer), true) => {
            let payloads: Vec<NewPayload> = args
                .messages
                .iter()
                .map(|m| NewPayload::new(write_pointer, m.clone().into_bytes()))
                .collect();
            store.payload_table().store(&topic, &payloads)?;
            vec![NewMessage::payload_reference(write_pointer)]
        }
        (Some(write_pointer), false) => args
            .messages
            .iter()
            .map(|m| NewMessage::transactional(m.clone().into_bytes(), write_pointer))
            .collect(),
        (None, _) => args
            .messages
            .iter()
            .map(|m| NewMessage::inline(m.clone().into_bytes()))
            .collect(),
    };

    let ids = store.message_table().store(&topic, &entries)?;
    tracing::info!(topic = %topic, messages = ids.len(), write_pointer = ?args.tx, "published");

    let mut out = std::io::stdout().lock();
    for id in ids {
        writeln!(out, "{id}")?;
    }
    Ok(())
}
