//! Silt CLI entry point.

use clap::Parser;

use silt::cli::{handle_error, Cli, Commands};
use silt::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Migrate(args) => silt::cli::commands::migrate::execute(args, &config, cli.json).await,
        Commands::Plan(args) => silt::cli::commands::plan::execute(args, &config, cli.json).await,
        Commands::State(args) => silt::cli::commands::state::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
