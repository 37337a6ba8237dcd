use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde_json::{Value, json};
use tms_api::{MessageEntry, MessageId, StoreError, TopicId, Transaction};
use tms_store::MessageStore;

use crate::config::FetchArgs;
use crate::error::CliError;

use super::{parse_topic, require_topic};

pub fn run(store: &MessageStore, args: FetchArgs) -> Result<(), CliError> {
    let topic = parse_topic(&args.topic)?;
    require_topic(store, &topic)?;
    let tx = reader_transaction(&args);

    let messages = store.message_table();
    let iter = match &args.after {
        Some(raw) => {
            let start: MessageId = raw
                .parse()
                .map_err(|e: StoreError| CliError::Argument(e.message().to_string()))?;
            messages.fetch_from(&topic, &start, args.inclusive, args.limit, tx.as_ref())?
        }
        None => messages.fetch(&topic, args.from_time, args.limit, tx.as_ref())?,
    };

    let mut out = std::io::stdout().lock();
    for entry in iter {
        let line = render(store, &topic, &entry?, tx.as_ref())?;
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// No snapshot flags means an unfiltered read.
fn reader_transaction(args: &FetchArgs) -> Option<Transaction> {
    match (args.read_pointer, args.invalid.is_empty()) {
        (None, true) => None,
        (None, false) => Some(Transaction::latest(args.invalid.iter().copied())),
        (Some(read_pointer), _) => {
            Some(Transaction::new(read_pointer, i64::MAX).with_invalid(args.invalid.iter().copied()))
        }
    }
}

fn render(
    store: &MessageStore,
    topic: &TopicId,
    entry: &MessageEntry,
    tx: Option<&Transaction>,
) -> Result<Value, CliError> {
    let mut line = json!({
        "id": entry.id.to_string(),
        "publish_ts": entry.publish_timestamp(),
        "seq": entry.sequence_id(),
        "write_pointer": entry.write_pointer,
    });
    match (&entry.payload, entry.write_pointer) {
        (Some(payload), _) => line["payload"] = payload_value(payload),
        (None, Some(write_pointer)) => {
            let start = MessageId::new(entry.publish_timestamp(), entry.sequence_id(), 0, 0);
            let payloads = store
                .payload_table()
                .fetch(topic, write_pointer, &start, true, usize::MAX, tx)?
                .map(|p| p.map(|p| payload_value(&p.payload)))
                .collect::<Result<Vec<_>, StoreError>>()?;
            line["payloads"] = Value::Array(payloads);
        }
        (None, None) => {
            return Err(StoreError::format(format!("message {} has neither payload nor transaction", entry.id)).into());
        }
    }
    Ok(line)
}

/// UTF-8 payloads print as strings, anything else as `{"base64": ...}`.
fn payload_value(payload: &Bytes) -> Value {
    match std::str::from_utf8(payload) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => json!({ "base64": STANDARD.encode(payload) }),
    }
}
