//! Stateful collector: one incremental-aware run per [`CollectionParams`].
//!
//! The run mode comes from the persisted [`SyncState`]; the resulting
//! [`RunPlan`] is handed to the query builder of the collector arguments so
//! incremental runs only ask for what changed since the previous successful
//! start. State is committed only after every page succeeded.
//!
//! [`CollectionParams`]: crate::domain::models::CollectionParams

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::collector_args::ApiCollectorArgs;
use super::collector_state::CollectorStateManager;
use super::context::CollectorContext;
use super::fetch_executor::CollectSummary;
use crate::domain::errors::CollectorResult;
use crate::domain::models::{RunPlan, SyncMode, SyncPolicy, SyncState};
use crate::domain::ports::InputIterator;

/// Result of a successful collector run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorOutcome {
    pub mode: SyncMode,
    #[serde(skip)]
    pub plan: RunPlan,
    pub summary: CollectSummary,
    pub state: SyncState,
}

pub struct StatefulCollector {
    ctx: CollectorContext,
}

impl StatefulCollector {
    pub const fn new(ctx: CollectorContext) -> Self {
        Self { ctx }
    }

    pub const fn context(&self) -> &CollectorContext {
        &self.ctx
    }

    /// Run one collection.
    ///
    /// Arguments are validated before any I/O. Errors come back wrapped with
    /// the collection params and leave the stored sync state untouched.
    #[instrument(skip_all, fields(params = %args.params))]
    pub async fn collect(
        &self,
        args: &ApiCollectorArgs,
        policy: Option<&SyncPolicy>,
        inputs: Option<Box<dyn InputIterator>>,
    ) -> CollectorResult<CollectorOutcome> {
        self.run(args, policy, inputs).await.map_err(|e| {
            warn!(error = %e, "collection failed, sync state not advanced");
            e.in_collection(&args.params)
        })
    }

    async fn run(
        &self,
        args: &ApiCollectorArgs,
        policy: Option<&SyncPolicy>,
        inputs: Option<Box<dyn InputIterator>>,
    ) -> CollectorResult<CollectorOutcome> {
        args.validate()?;
        self.ctx.raw_store.ensure_table(&args.params).await?;

        let manager = CollectorStateManager::begin(
            Arc::clone(&self.ctx.sync_states),
            &args.params,
            policy.cloned(),
            Utc::now(),
        )
        .await?;
        let plan = *manager.plan();

        let summary = self.ctx.executor().run(args, &plan, inputs).await?;
        let state = manager.commit(Utc::now()).await?;

        info!(
            mode = ?plan.mode,
            records = summary.records,
            latest_success_start = ?state.latest_success_start,
            "collection committed"
        );
        Ok(CollectorOutcome {
            mode: plan.mode,
            plan,
            summary,
            state,
        })
    }
}
