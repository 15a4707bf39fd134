//! Implementation of the `silt migrate` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::open_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct MigrateArgs {}

#[derive(Debug, Serialize)]
pub struct MigrateOutput {
    pub database: String,
    pub migrated: bool,
}

impl CommandOutput for MigrateOutput {
    fn to_human(&self) -> String {
        format!("Database at {} is up to date", self.database)
    }
}

pub async fn execute(_args: MigrateArgs, config: &Config, json_mode: bool) -> Result<()> {
    let db = open_database(config).await?;
    db.close().await;

    output(
        &MigrateOutput {
            database: config.database.path.clone(),
            migrated: true,
        },
        json_mode,
    );
    Ok(())
}
