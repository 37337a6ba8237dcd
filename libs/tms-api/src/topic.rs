use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Terminates every name component inside a row key.
///
/// Names never contain it, so the encoded topic is prefix-free: the key range of
/// topic `a` never reaches into topic `ab`.
const NAME_TERMINATOR: u8 = 0x00;

fn validate_name(what: &str, name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::config(format!("{what} name is empty")));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(StoreError::config(format!(
            "{what} name '{name}' contains invalid character {c:?}"
        )));
    }
    Ok(())
}

/// Namespace owning a set of topics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(String);

impl NamespaceId {
    pub fn new(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        validate_name("namespace", &name)?;
        Ok(Self(name))
    }

    /// The `default` namespace.
    pub fn default_namespace() -> Self {
        Self("default".to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn topic(&self, topic: impl Into<String>) -> Result<TopicId, StoreError> {
        TopicId::new(self.clone(), topic)
    }

    /// Row-key prefix shared by every topic of this namespace.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        out.extend_from_slice(self.0.as_bytes());
        out.push(NAME_TERMINATOR);
        out
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical message stream: namespace + name.
///
/// Serializes to the row-key namespace of all its entries, see [`TopicId::to_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicId {
    namespace: NamespaceId,
    topic: String,
}

impl TopicId {
    pub fn new(namespace: NamespaceId, topic: impl Into<String>) -> Result<Self, StoreError> {
        let topic = topic.into();
        validate_name("topic", &topic)?;
        Ok(Self { namespace, topic })
    }

    pub fn namespace(&self) -> &NamespaceId {
        &self.namespace
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// `namespace 0x00 topic 0x00`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.namespace.to_bytes();
        out.reserve(self.topic.len() + 1);
        out.extend_from_slice(self.topic.as_bytes());
        out.push(NAME_TERMINATOR);
        out
    }

    /// Parse the exact output of [`TopicId::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let mut parts = bytes.split(|b| *b == NAME_TERMINATOR);
        let (Some(ns), Some(topic), Some(rest), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(StoreError::format("malformed topic bytes"));
        };
        if !rest.is_empty() {
            return Err(StoreError::format("trailing bytes after topic"));
        }
        let ns = String::from_utf8(ns.to_vec())?;
        let topic = String::from_utf8(topic.to_vec())?;
        TopicId::new(NamespaceId::new(ns)?, topic)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.topic)
    }
}

/// `namespace:topic`, or a bare `topic` in the default namespace.
impl FromStr for TopicId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((ns, topic)) => TopicId::new(NamespaceId::new(ns)?, topic),
            None => TopicId::new(NamespaceId::default_namespace(), s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_bytes_round_trip() {
        let topic: TopicId = "system:audit.log".parse().unwrap();
        let bytes = topic.to_bytes();
        assert_eq!(bytes, b"system\0audit.log\0");
        assert_eq!(TopicId::from_bytes(&bytes).unwrap(), topic);
    }

    #[test]
    fn topic_prefixes_are_prefix_free() {
        let short = NamespaceId::default_namespace().topic("a").unwrap().to_bytes();
        let long = NamespaceId::default_namespace().topic("ab").unwrap().to_bytes();
        assert!(!long.starts_with(&short));
    }

    #[test]
    fn rejects_separator_characters() {
        assert!("ns:bad:name".parse::<TopicId>().is_err());
        assert!(NamespaceId::new("").is_err());
        assert!(NamespaceId::new("white space").is_err());
    }
}
