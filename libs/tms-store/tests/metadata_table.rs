mod common;

use anyhow::Result;
use tms_api::{ErrorKind, MetadataTable, NamespaceId, TopicProperties};
use tms_store::BackendMetadataTable;

use common::{engines, topic};

#[test]
fn topic_lifecycle() -> Result<()> {
    for engine in engines()? {
        let table = BackendMetadataTable::new(engine.provider.clone(), "tms_metadata", "d");
        let t = topic("billing:invoices");
        let mut props = TopicProperties::new();
        props.insert("ttl".into(), "3600".into());

        assert_eq!(table.get_properties(&t)?, None, "{}", engine.name);
        table.create_topic(&t, &props)?;
        assert_eq!(table.get_properties(&t)?, Some(props.clone()));

        let err = table.create_topic(&t, &TopicProperties::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        table.delete_topic(&t)?;
        assert_eq!(table.get_properties(&t)?, None);
        assert_eq!(table.delete_topic(&t).unwrap_err().kind(), ErrorKind::NotFound);
    }
    Ok(())
}

#[test]
fn list_topics_is_scoped_to_a_namespace() -> Result<()> {
    for engine in engines()? {
        let table = BackendMetadataTable::new(engine.provider.clone(), "tms_metadata", "d");
        for name in ["billing:a", "billing:b", "billingx:c", "default:d"] {
            table.create_topic(&topic(name), &TopicProperties::new())?;
        }

        let billing = table.list_topics(&NamespaceId::new("billing")?)?;
        let names: Vec<String> = billing.iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["billing:a", "billing:b"], "{}", engine.name);

        let default = table.list_topics(&NamespaceId::default_namespace())?;
        assert_eq!(default, vec![topic("d")]);
    }
    Ok(())
}

#[test]
fn topic_whose_name_prefixes_another_is_distinct() -> Result<()> {
    for engine in engines()? {
        let table = BackendMetadataTable::new(engine.provider.clone(), "tms_metadata", "d");
        table.create_topic(&topic("ab"), &TopicProperties::new())?;
        assert_eq!(table.get_properties(&topic("a"))?, None, "{}", engine.name);
        table.create_topic(&topic("a"), &TopicProperties::new())?;
        assert_eq!(table.list_topics(&NamespaceId::default_namespace())?.len(), 2);
    }
    Ok(())
}
