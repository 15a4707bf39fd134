//! Finalizable collector for entities whose state keeps changing after they
//! are first seen (open issues, unmerged pull requests, running jobs).
//!
//! A run has two phases over one raw table:
//! 1. **list**: pages the listing endpoint newest first and stops once a
//!    record is created at or before the run's lower bound;
//! 2. **detail**: refetches every stored record that is not finalized yet,
//!    replacing its previous detail row.
//!
//! The detail phase runs on incremental runs only; a full run has just
//! listed everything. The sync state advances only after both phases.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::value::RawValue;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::collector_args::{raw_field, ApiCollectorArgs, ParsedPage};
use super::collector_state::CollectorStateManager;
use super::context::CollectorContext;
use super::fetch_executor::CollectSummary;
use crate::domain::errors::{CollectorError, CollectorResult};
use crate::domain::models::{
    CollectionParams, RunPlan, SyncMode, SyncPolicy, SyncState, WriteMode,
};
use crate::domain::ports::{InputIterator, RawDataStore};
use crate::infrastructure::http::ApiResponse;

pub type CreatedAtFn = Arc<dyn Fn(&RawValue) -> CollectorResult<DateTime<Utc>> + Send + Sync>;
/// Builds the detail-phase inputs once the list phase stored its rows.
pub type DetailInputsFn =
    Arc<dyn Fn(Arc<dyn RawDataStore>, CollectionParams) -> Box<dyn InputIterator> + Send + Sync>;

/// Second phase: one request per unfinalized record.
#[derive(Clone)]
pub struct DetailPhase {
    pub args: ApiCollectorArgs,
    pub inputs: DetailInputsFn,
}

impl DetailPhase {
    pub fn new(
        args: ApiCollectorArgs,
        inputs: impl Fn(Arc<dyn RawDataStore>, CollectionParams) -> Box<dyn InputIterator>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            args: args.write_mode(WriteMode::ReplaceByUrl),
            inputs: Arc::new(inputs),
        }
    }
}

#[derive(Clone)]
pub struct FinalizableArgs {
    pub list: ApiCollectorArgs,
    pub created_at: CreatedAtFn,
    pub detail: Option<DetailPhase>,
}

impl FinalizableArgs {
    pub fn new(
        list: ApiCollectorArgs,
        created_at: impl Fn(&RawValue) -> CollectorResult<DateTime<Utc>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            list,
            created_at: Arc::new(created_at),
            detail: None,
        }
    }

    #[must_use]
    pub fn detail(mut self, detail: DetailPhase) -> Self {
        self.detail = Some(detail);
        self
    }

    fn validate(&self) -> CollectorResult<()> {
        self.list.validate()?;
        if let Some(detail) = &self.detail {
            detail.args.validate()?;
            if detail.args.params != self.list.params {
                return Err(CollectorError::Validation(format!(
                    "detail phase writes {} but list phase writes {}",
                    detail.args.params, self.list.params
                )));
            }
        }
        Ok(())
    }
}

/// Reads an RFC 3339 timestamp from a top-level field of each record.
pub fn created_at_field(
    field: &'static str,
) -> impl Fn(&RawValue) -> CollectorResult<DateTime<Utc>> + Send + Sync + 'static {
    move |record: &RawValue| {
        let value = raw_field(record, field)?;
        let text = value
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CollectorError::Parse(format!("record has no '{field}' timestamp")))?;
        DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| CollectorError::Parse(format!("bad '{field}' timestamp '{text}': {e}")))
    }
}

/// Drop every item created at or before `floor`, flagging the page finished.
///
/// Listings are newest first, so the first old item ends the page.
pub fn truncate_at_floor(
    mut page: ParsedPage,
    floor: Option<DateTime<Utc>>,
    created_at: &CreatedAtFn,
) -> CollectorResult<ParsedPage> {
    let Some(floor) = floor else {
        return Ok(page);
    };
    let mut keep = page.items.len();
    for (index, item) in page.items.iter().enumerate() {
        if created_at(&**item)? <= floor {
            keep = index;
            break;
        }
    }
    if keep < page.items.len() {
        debug!(kept = keep, dropped = page.items.len() - keep, "reached already-collected records");
        page.items.truncate(keep);
        page.finished = true;
    }
    Ok(page)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizableOutcome {
    pub mode: SyncMode,
    #[serde(skip)]
    pub plan: RunPlan,
    pub list: CollectSummary,
    /// `None` when the detail phase did not run
    pub detail: Option<CollectSummary>,
    pub state: SyncState,
}

pub struct FinalizableCollector {
    ctx: CollectorContext,
}

impl FinalizableCollector {
    pub const fn new(ctx: CollectorContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip_all, fields(params = %args.list.params))]
    pub async fn collect(
        &self,
        args: &FinalizableArgs,
        policy: Option<&SyncPolicy>,
    ) -> CollectorResult<FinalizableOutcome> {
        self.run(args, policy).await.map_err(|e| {
            warn!(error = %e, "finalizable collection failed, sync state not advanced");
            e.in_collection(&args.list.params)
        })
    }

    async fn run(
        &self,
        args: &FinalizableArgs,
        policy: Option<&SyncPolicy>,
    ) -> CollectorResult<FinalizableOutcome> {
        args.validate()?;
        let params = &args.list.params;
        self.ctx.raw_store.ensure_table(params).await?;

        let manager = CollectorStateManager::begin(
            Arc::clone(&self.ctx.sync_states),
            params,
            policy.cloned(),
            Utc::now(),
        )
        .await?;
        let plan = *manager.plan();
        let executor = self.ctx.executor();

        let list_args = Self::list_args(args, plan.since);
        let list = executor.run(&list_args, &plan, None).await?;

        let detail = match &args.detail {
            Some(phase) if plan.is_incremental() => {
                let inputs = (phase.inputs)(Arc::clone(&self.ctx.raw_store), params.clone());
                Some(executor.run(&phase.args, &plan, Some(inputs)).await?)
            }
            Some(_) => {
                debug!("full run, skipping detail phase");
                None
            }
            None => None,
        };

        let state = manager.commit(Utc::now()).await?;
        info!(
            mode = ?plan.mode,
            listed = list.records,
            refreshed = detail.map_or(0, |d| d.records),
            "finalizable collection committed"
        );
        Ok(FinalizableOutcome {
            mode: plan.mode,
            plan,
            list,
            detail,
            state,
        })
    }

    fn list_args(args: &FinalizableArgs, floor: Option<DateTime<Utc>>) -> ApiCollectorArgs {
        let parser = Arc::clone(&args.list.parser);
        let created_at = Arc::clone(&args.created_at);
        let mut list = args.list.clone();
        list.parser = Arc::new(move |response: &ApiResponse| {
            truncate_at_floor(parser(response)?, floor, &created_at)
        });
        list
    }
}
