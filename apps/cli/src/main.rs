//! Newsloom CLI — background enrichment for a local news archive.
//!
//! Ingests raw articles, runs the summarize/sentiment/category/embedding
//! worker against them, and answers semantic search queries over the
//! enriched archive.

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
