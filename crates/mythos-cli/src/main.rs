//! # mythos
//!
//! Command-line front end: batch generation of mythological creations and
//! management of the local gallery (list, rename, delete, export, import).

mod cli;
mod commands;
mod config;

use clap::Parser;
use mythos_shared::constants::APP_NAME;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,mythos_store=info,mythos_batch=debug,mythos_ai=debug")
        }))
        .with_writer(std::io::stderr)
        .init();

    // -----------------------------------------------------------------------
    // 2. Parse arguments and load configuration
    // -----------------------------------------------------------------------
    let cli = Cli::parse();
    let config = AppConfig::from_env();
    info!("{APP_NAME} v{}", env!("CARGO_PKG_VERSION"));
    debug!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Run the command
    // -----------------------------------------------------------------------
    if let Err(e) = commands::dispatch(cli.command, &config).await {
        tracing::error!(error = %e, "command failed");
        return Err(e);
    }
    Ok(())
}
