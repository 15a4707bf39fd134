use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::domain::errors::CollectorResult;
use crate::domain::models::{CollectionParams, RunPlan, SyncPolicy, SyncState};
use crate::domain::ports::SyncStateRepository;

/// Loads the sync state of one collection, decides the run mode and commits
/// the advanced state once the whole run succeeded.
///
/// One manager owns one [`CollectionParams`] for one run; nothing is written
/// unless [`CollectorStateManager::commit`] is called.
pub struct CollectorStateManager {
    repository: Arc<dyn SyncStateRepository>,
    policy: Option<SyncPolicy>,
    state: SyncState,
    plan: RunPlan,
}

impl CollectorStateManager {
    pub async fn begin(
        repository: Arc<dyn SyncStateRepository>,
        params: &CollectionParams,
        policy: Option<SyncPolicy>,
        now: DateTime<Utc>,
    ) -> CollectorResult<Self> {
        let state = repository
            .get(params)
            .await?
            .unwrap_or_else(|| SyncState::empty(params.clone()));
        let plan = state.plan_run(policy.as_ref(), now);

        info!(
            params = %params,
            mode = ?plan.mode,
            since = ?plan.since,
            previous_start = ?state.latest_success_start,
            "collection mode decided"
        );

        Ok(Self {
            repository,
            policy,
            state,
            plan,
        })
    }

    pub const fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// State as loaded before the run
    pub const fn previous(&self) -> &SyncState {
        &self.state
    }

    /// Persist the advanced state and return it.
    pub async fn commit(self, finished_at: DateTime<Utc>) -> CollectorResult<SyncState> {
        let next = self
            .state
            .advanced(&self.plan, self.policy.as_ref(), finished_at);
        self.repository.save(&next).await?;
        Ok(next)
    }
}
