//! Implementation of the `silt state` command.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use crate::cli::open_database;
use crate::cli::output::{output, table, CommandOutput};
use crate::domain::models::{CollectionParams, Config, SyncState};
use crate::domain::ports::SyncStateRepository;
use crate::infrastructure::database::SyncStateRepositoryImpl;

#[derive(Args, Debug)]
pub struct StateArgs {
    /// Raw table name without the `_raw_` prefix, e.g. github_api_runs
    #[arg(short, long)]
    pub table: String,

    /// Connection id
    #[arg(short, long)]
    pub connection: u64,

    /// Scope id
    #[arg(short, long)]
    pub scope: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateOutput {
    pub params: CollectionParams,
    pub state: Option<SyncState>,
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
}

impl CommandOutput for StateOutput {
    fn to_human(&self) -> String {
        let Some(state) = &self.state else {
            return format!("No successful run recorded for {}", self.params);
        };
        let mut t = table(&["Field", "Value"]);
        t.add_row(vec!["Raw table".to_string(), self.params.raw_table()]);
        t.add_row(vec!["Params".to_string(), self.params.key()]);
        t.add_row(vec!["Time after".to_string(), format_time(state.time_after)]);
        t.add_row(vec![
            "Latest success start".to_string(),
            format_time(state.latest_success_start),
        ]);
        t.add_row(vec![
            "Latest success end".to_string(),
            format_time(state.latest_success_end),
        ]);
        t.to_string()
    }
}

pub async fn execute(args: StateArgs, config: &Config, json_mode: bool) -> Result<()> {
    let params = CollectionParams::new(args.connection, args.scope, args.table);
    params.validate()?;

    let db = open_database(config).await?;
    let repo = SyncStateRepositoryImpl::new(db.pool().clone());
    let state = repo
        .get(&params)
        .await
        .with_context(|| format!("Failed to read sync state of {params}"))?;
    db.close().await;

    output(&StateOutput { params, state }, json_mode);
    Ok(())
}
