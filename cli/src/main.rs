use anyhow::Result;
use clap::Parser;
use colored::*;
use tracing::error;

mod app;
mod cli;
mod logging;
mod output;

use crate::cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match app::resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format!("Error loading configuration: {:#}", e).red());
            return Err(e);
        }
    };

    logging::init(config.log_level.as_deref());

    if let Err(e) = app::run(args, config).await {
        error!("peerlink failed: {:#}", e);
        eprintln!("{}", format!("Error: {:#}", e).red());
        return Err(e);
    }

    Ok(())
}
