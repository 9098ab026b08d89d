//! lessonctx CLI: curriculum context resolution for lesson generation.
//!
//! Ingests scheme-of-work and textbook JSON into a local store and resolves
//! `(grade, subject, lesson, type)` requests into a single context document.

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
