mod auth;
mod cli;
mod config;
mod error;
mod models;
mod output;
mod providers;
mod tracker;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    if !cli.quiet() {
        output::print_banner();
    }

    info!("Starting AdoptLens - Pipeline Template Adoption Tracker");
    cli.execute().await?;

    Ok(())
}
