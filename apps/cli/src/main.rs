//! contractsync CLI: incremental mirror of the DOGE contracts API.
//!
//! Syncs the paginated contracts feed into a local CSV store, enriches each
//! contract from its FPDS detail page, and exports a cleaned table.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
