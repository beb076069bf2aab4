//! docdigest CLI: map-reduce question answering over a document corpus.
//!
//! Extracts text from every matching file with Apache Tika, asks a local
//! Ollama model the same question of each chunk, and consolidates the answers.

mod batch;
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
