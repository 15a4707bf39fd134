//! Command-line interface
//!
//! `silt migrate`, `silt plan` and `silt state`, each with a human table
//! view and a `--json` view.

pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::database::DatabaseConnection;

#[derive(Parser, Debug)]
#[command(name = "silt")]
#[command(about = "Silt - incremental collection engine for third-party activity APIs", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .silt/config.yaml and .silt/local.yaml)
    #[arg(short, long, global = true, env = "SILT_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply database migrations
    Migrate(commands::migrate::MigrateArgs),
    /// Build the pipeline plan of a blueprint
    Plan(commands::plan::PlanArgs),
    /// Show the sync state of one collection
    State(commands::state::StateArgs),
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        }
    }
}

/// Open the configured database and bring its schema up to date.
pub async fn open_database(config: &Config) -> Result<DatabaseConnection> {
    let db = DatabaseConnection::open(&config.database.path, config.database.max_connections)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    db.migrate().await.context("Failed to apply migrations")?;
    Ok(db)
}

/// Print an error and exit with status 1
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": causes,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    std::process::exit(1);
}
