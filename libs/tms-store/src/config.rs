use std::path::Path;

use serde::Deserialize;
use tms_api::StoreError;
use tms_storage_columnar::ColumnarConfig;
use tms_storage_embedded::EmbeddedConfig;

/// Storage engine selection, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Columnar(ColumnarConfig),
    Embedded(EmbeddedConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Columnar(_) => "columnar",
            Self::Embedded(_) => "embedded",
        }
    }
}

/// Store configuration, usually the `[store]` section of a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: BackendConfig,

    #[serde(default = "default_message_table")]
    pub message_table: String,

    #[serde(default = "default_payload_table")]
    pub payload_table: String,

    #[serde(default = "default_metadata_table")]
    pub metadata_table: String,

    /// Column family every table writes its cells under.
    #[serde(default = "default_column_family")]
    pub column_family: String,
}

fn default_message_table() -> String {
    "tms_messages".into()
}

fn default_payload_table() -> String {
    "tms_payloads".into()
}

fn default_metadata_table() -> String {
    "tms_metadata".into()
}

fn default_column_family() -> String {
    "d".into()
}

impl StoreConfig {
    /// Default table layout over the given backend.
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            message_table: default_message_table(),
            payload_table: default_payload_table(),
            metadata_table: default_metadata_table(),
            column_family: default_column_family(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::config(format!("{}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, StoreError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| StoreError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        let tables = [&self.message_table, &self.payload_table, &self.metadata_table];
        if tables.iter().any(|t| t.is_empty()) {
            return Err(StoreError::config("table names must not be empty"));
        }
        if self.message_table == self.payload_table
            || self.message_table == self.metadata_table
            || self.payload_table == self.metadata_table
        {
            return Err(StoreError::config("message, payload and metadata tables must differ"));
        }
        if self.column_family.is_empty() {
            return Err(StoreError::config("column_family must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_backend_with_defaults() {
        let config = StoreConfig::parse(
            r#"
            [backend]
            type = "embedded"
            data_dir = "/var/lib/tms"
            "#,
        )
        .unwrap();
        let BackendConfig::Embedded(embedded) = &config.backend else {
            panic!("expected embedded backend");
        };
        assert_eq!(embedded.data_dir.to_str(), Some("/var/lib/tms"));
        assert!(!embedded.sync_writes);
        assert_eq!(embedded.scan_batch, 256);
        assert_eq!(config.message_table, "tms_messages");
        assert_eq!(config.column_family, "d");
    }

    #[test]
    fn columnar_backend_with_overrides() {
        let config = StoreConfig::parse(
            r#"
            message_table = "msgs"
            column_family = "f"

            [backend]
            type = "columnar"
            scan_caching = 10
            "#,
        )
        .unwrap();
        let BackendConfig::Columnar(columnar) = &config.backend else {
            panic!("expected columnar backend");
        };
        assert_eq!(columnar.scan_caching, 10);
        assert_eq!(config.message_table, "msgs");
        assert_eq!(config.backend.kind(), "columnar");
    }

    #[test]
    fn rejects_unknown_backend_and_clashing_tables() {
        let err = StoreConfig::parse("[backend]\ntype = \"cassandra\"\n").unwrap_err();
        assert_eq!(err.kind(), tms_api::ErrorKind::Config);

        let err = StoreConfig::parse(
            "payload_table = \"tms_messages\"\n[backend]\ntype = \"columnar\"\n",
        )
        .unwrap_err();
        assert!(err.message().contains("must differ"));
    }
}
