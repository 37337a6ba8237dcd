use std::io::Write;

use tms_api::{NamespaceId, StoreError, TopicProperties};
use tms_store::MessageStore;

use crate::config::{TopicArgs, TopicCommand};
use crate::error::CliError;

use super::parse_topic;

pub fn run(store: &MessageStore, args: TopicArgs) -> Result<(), CliError> {
    let metadata = store.metadata_table();
    let mut out = std::io::stdout().lock();
    match args.command {
        TopicCommand::Create { topic, properties } => {
            let topic = parse_topic(&topic)?;
            let properties = parse_properties(&properties)?;
            metadata.create_topic(&topic, &properties)?;
            tracing::info!(topic = %topic, properties = properties.len(), "created topic");
            writeln!(out, "{topic}")?;
        }
        TopicCommand::List { namespace } => {
            let namespace = NamespaceId::new(namespace.as_str()).map_err(|e: StoreError| {
                CliError::Argument(format!("namespace '{namespace}': {}", e.message()))
            })?;
            for topic in metadata.list_topics(&namespace)? {
                writeln!(out, "{topic}")?;
            }
        }
        TopicCommand::Info { topic } => {
            let topic = parse_topic(&topic)?;
            let properties = metadata
                .get_properties(&topic)?
                .ok_or_else(|| StoreError::not_found(format!("topic '{topic}' does not exist")))?;
            let info = serde_json::json!({ "topic": topic.to_string(), "properties": properties });
            writeln!(out, "{info}")?;
        }
        TopicCommand::Delete { topic } => {
            let topic = parse_topic(&topic)?;
            metadata.delete_topic(&topic)?;
            tracing::info!(topic = %topic, "deleted topic");
        }
    }
    Ok(())
}

fn parse_properties(raw: &[String]) -> Result<TopicProperties, CliError> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(CliError::Argument(format!("property '{pair}' is not key=value"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_split_on_first_equals() {
        let props = parse_properties(&["ttl=1=2".into(), "owner=".into()]).unwrap();
        assert_eq!(props.get("ttl").map(String::as_str), Some("1=2"));
        assert_eq!(props.get("owner").map(String::as_str), Some(""));
    }

    #[test]
    fn property_without_key_is_rejected() {
        assert!(parse_properties(&["=x".into()]).is_err());
        assert!(parse_properties(&["x".into()]).is_err());
    }
}
