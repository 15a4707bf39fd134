use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CollectionParams;

/// Caller-supplied sync policy, typically from a blueprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
    /// Lower bound for data to collect; `None` means unbounded
    #[serde(default)]
    pub time_after: Option<DateTime<Utc>>,

    /// Ignore previous state and collect everything since `time_after`
    #[serde(default)]
    pub full_sync: bool,
}

impl SyncPolicy {
    pub fn since(time_after: DateTime<Utc>) -> Self {
        Self {
            time_after: Some(time_after),
            full_sync: false,
        }
    }

    pub fn full() -> Self {
        Self {
            time_after: None,
            full_sync: true,
        }
    }
}

/// Persisted state of the last fully-successful run for one [`CollectionParams`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub params: CollectionParams,
    /// `time_after` of the policy the last successful run used
    pub time_after: Option<DateTime<Utc>>,
    /// When the last successful run started
    pub latest_success_start: Option<DateTime<Utc>>,
    /// When the last successful run finished
    pub latest_success_end: Option<DateTime<Utc>>,
}

/// Whether a run collects everything or only what changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    Incremental,
}

/// Outcome of the mode decision for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    pub mode: SyncMode,
    /// Effective lower bound handed to query builders
    pub since: Option<DateTime<Utc>>,
    /// Captured before any request is issued; becomes `latest_success_start`
    pub started_at: DateTime<Utc>,
}

impl RunPlan {
    pub const fn is_incremental(&self) -> bool {
        matches!(self.mode, SyncMode::Incremental)
    }
}

impl SyncState {
    /// Fresh state for params that were never collected.
    pub fn empty(params: CollectionParams) -> Self {
        Self {
            params,
            time_after: None,
            latest_success_start: None,
            latest_success_end: None,
        }
    }

    /// Decide full vs. incremental for a run starting at `now`.
    ///
    /// Incremental runs use `latest_success_start` as the lower bound, even
    /// when the caller asks for a later `time_after`. A forced full sync, a
    /// first run, or a `time_after` earlier than the one recorded with the
    /// previous run all produce a full run bounded by the policy.
    pub fn plan_run(&self, policy: Option<&SyncPolicy>, now: DateTime<Utc>) -> RunPlan {
        let full = |since| RunPlan {
            mode: SyncMode::Full,
            since,
            started_at: now,
        };
        let incremental = |since| RunPlan {
            mode: SyncMode::Incremental,
            since,
            started_at: now,
        };

        let Some(last_start) = self.latest_success_start else {
            return full(policy.and_then(|p| p.time_after));
        };
        let Some(policy) = policy else {
            return incremental(Some(last_start));
        };
        if policy.full_sync {
            return full(policy.time_after);
        }
        match (policy.time_after, self.time_after) {
            (Some(requested), Some(recorded)) if requested < recorded => full(Some(requested)),
            _ => incremental(Some(last_start)),
        }
    }

    /// State to persist after `plan` completed successfully at `finished_at`.
    #[must_use]
    pub fn advanced(
        &self,
        plan: &RunPlan,
        policy: Option<&SyncPolicy>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            params: self.params.clone(),
            time_after: policy.and_then(|p| p.time_after),
            latest_success_start: Some(plan.started_at),
            latest_success_end: Some(finished_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    fn state(time_after: Option<DateTime<Utc>>, start: Option<DateTime<Utc>>) -> SyncState {
        SyncState {
            params: CollectionParams::new(1, "12345", "github_api_runs"),
            time_after,
            latest_success_start: start,
            latest_success_end: start,
        }
    }

    #[test]
    fn test_mode_decisions() {
        let now = t(2023);
        let cases: Vec<(&str, SyncState, Option<SyncPolicy>, SyncMode, Option<DateTime<Utc>>)> = vec![
            ("first run, no policy", state(None, None), None, SyncMode::Full, None),
            (
                "first run with time_after",
                state(None, None),
                Some(SyncPolicy::since(t(2021))),
                SyncMode::Full,
                Some(t(2021)),
            ),
            (
                "second run without policy",
                state(None, Some(t(2021))),
                None,
                SyncMode::Incremental,
                Some(t(2021)),
            ),
            (
                "later time_after cannot be honoured",
                state(Some(t(2021)), Some(t(2022))),
                Some(SyncPolicy::since(t(2022))),
                SyncMode::Incremental,
                Some(t(2022)),
            ),
            (
                "same time_after",
                state(Some(t(2021)), Some(t(2022))),
                Some(SyncPolicy::since(t(2021))),
                SyncMode::Incremental,
                Some(t(2022)),
            ),
            (
                "earlier time_after widens history",
                state(Some(t(2021)), Some(t(2021))),
                Some(SyncPolicy::since(t(2020))),
                SyncMode::Full,
                Some(t(2020)),
            ),
            (
                "forced full sync",
                state(Some(t(2021)), Some(t(2021))),
                Some(SyncPolicy::full()),
                SyncMode::Full,
                None,
            ),
        ];

        for (name, state, policy, mode, since) in cases {
            let plan = state.plan_run(policy.as_ref(), now);
            assert_eq!(plan.mode, mode, "{name}");
            assert_eq!(plan.since, since, "{name}");
            assert_eq!(plan.started_at, now, "{name}");
        }
    }

    #[test]
    fn test_advanced_uses_run_start_not_data_time() {
        let before = state(None, None);
        let plan = before.plan_run(None, t(2023));
        let after = before.advanced(&plan, Some(&SyncPolicy::since(t(2020))), t(2024));

        assert_eq!(after.latest_success_start, Some(t(2023)));
        assert_eq!(after.latest_success_end, Some(t(2024)));
        assert_eq!(after.time_after, Some(t(2020)));
        assert_eq!(after.params, before.params);
    }
}
