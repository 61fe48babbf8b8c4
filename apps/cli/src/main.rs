//! leadscout CLI: scheduled lead generation for a list of target companies.
//!
//! Gathers public signals, asks a language model about sales interest, and
//! notifies each new (company, area) lead exactly once.

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
