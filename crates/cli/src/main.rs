//! CLI entry point for the chat-cluster server.

mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = CliConfig::parse();
    config.run().await
}
