mod cmd;
mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = config::open_store(&cli.global).and_then(|store| {
        let result = match cli.command {
            Commands::Topic(args) => cmd::topic::run(&store, args),
            Commands::Publish(args) => cmd::publish::run(&store, args),
            Commands::Fetch(args) => cmd::fetch::run(&store, args),
            Commands::Rollback(args) => cmd::rollback::run(&store, args),
        };
        let closed = store.close().map_err(error::CliError::from);
        result.and(closed)
    });
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
