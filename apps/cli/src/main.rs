//! apiscout CLI — API endpoint discovery for JavaScript source.
//!
//! Combines deterministic pattern matching with a semantic LLM analyzer
//! and reconciles both into one deduplicated, confidence-scored endpoint
//! inventory with line-accurate provenance.

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
