use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tms_store::{BackendConfig, MessageStore, StoreConfig};
use tms_storage_embedded::EmbeddedConfig;

use crate::error::CliError;

// ── CLI ──

#[derive(Parser)]
#[command(name = "tms", about = "Transactional message storage operator tool")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// TOML file with a [store] section
    #[arg(long, global = true, env = "TMS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory of the embedded backend, used when no config file is given
    #[arg(long, global = true, default_value = "tms-data", env = "TMS_DATA_DIR")]
    pub data_dir: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, list, inspect or delete topics
    Topic(TopicArgs),
    /// Append messages to a topic
    Publish(PublishArgs),
    /// Read messages of a topic as JSON lines
    Fetch(FetchArgs),
    /// Remove everything a transaction wrote to a topic
    Rollback(RollbackArgs),
}

#[derive(Args)]
pub struct TopicArgs {
    #[command(subcommand)]
    pub command: TopicCommand,
}

#[derive(Subcommand)]
pub enum TopicCommand {
    Create {
        /// `namespace:topic` or a bare topic in the default namespace
        topic: String,
        /// Topic property as key=value, repeatable
        #[arg(long = "property", short = 'p')]
        properties: Vec<String>,
    },
    List {
        #[arg(long, default_value = "default")]
        namespace: String,
    },
    Info {
        topic: String,
    },
    Delete {
        topic: String,
    },
}

#[derive(Args)]
pub struct PublishArgs {
    pub topic: String,

    /// Message payloads, one message each
    #[arg(required = true)]
    pub messages: Vec<String>,

    /// Write pointer of the publishing transaction
    #[arg(long)]
    pub tx: Option<i64>,

    /// Store payloads in the payload table behind one reference message (needs --tx)
    #[arg(long, requires = "tx")]
    pub payload_ref: bool,
}

#[derive(Args)]
pub struct FetchArgs {
    pub topic: String,

    /// Start at the first message published at or after this time (ms)
    #[arg(long, default_value_t = 0, conflicts_with = "after")]
    pub from_time: i64,

    /// Resume from a message id printed by an earlier fetch
    #[arg(long)]
    pub after: Option<String>,

    /// Include the message named by --after
    #[arg(long, requires = "after")]
    pub inclusive: bool,

    #[arg(long, default_value_t = 100)]
    pub limit: usize,

    /// Read as a transaction that excludes these write pointers
    #[arg(long, value_delimiter = ',')]
    pub invalid: Vec<i64>,

    /// Read pointer of the reading transaction; defaults to seeing all committed writes
    #[arg(long)]
    pub read_pointer: Option<i64>,
}

#[derive(Args)]
pub struct RollbackArgs {
    pub topic: String,

    /// Write pointer of the aborted transaction
    pub write_pointer: i64,
}

// ── File config ──

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub store: StoreConfig,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Config {
            context: "read",
            detail: format!("{}: {e}", path.display()),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| CliError::Config {
            context: "parse",
            detail: e.to_string(),
        })?;
        config.store.validate().map_err(|e| CliError::Config {
            context: "validate",
            detail: e.to_string(),
        })?;
        // Every invocation is a new process: the store must outlive it.
        if let BackendConfig::Columnar(_) = config.store.backend {
            return Err(CliError::Config {
                context: "validate",
                detail: "the columnar backend lives in process memory; use the embedded backend"
                    .into(),
            });
        }
        Ok(config)
    }
}

/// Store configuration from `--config`, or the embedded backend in `--data-dir`.
pub fn store_config(global: &GlobalArgs) -> Result<StoreConfig, CliError> {
    match &global.config {
        Some(path) => Ok(CliConfig::load(path)?.store),
        None => Ok(StoreConfig::new(BackendConfig::Embedded(EmbeddedConfig::new(
            global.data_dir.clone(),
        )))),
    }
}

pub fn open_store(global: &GlobalArgs) -> Result<MessageStore, CliError> {
    let config = store_config(global)?;
    tracing::debug!(backend = config.backend.kind(), "opening message store");
    Ok(MessageStore::open(config)?)
}
