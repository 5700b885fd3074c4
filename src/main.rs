#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::Result;
use clap::Parser;
use hearth::Config;
use hearth::cli::commands::Cli;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_init()?;
    hearth::observability::init(&config.observability);
    hearth::app::dispatch::dispatch(cli, Arc::new(config)).await
}
