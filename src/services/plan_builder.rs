//! Pipeline plan builder.
//!
//! Turns the scopes of a blueprint into ordered stages: scope `i` puts its
//! collection task (and a repository extraction task when code is
//! requested) into stage `i`; a diff task requested by the scope config runs
//! after the collection task, in stage `i + 1`.

use std::sync::Arc;
use tracing::{info, instrument};

use super::stage_graph::StageGraph;
use super::subtask_selection::select_subtasks;
use crate::domain::errors::{CollectorError, CollectorResult};
use crate::domain::models::{
    domain_type, generate_domain_id, BlueprintScope, CollectOptions, DiffOptions, DomainScope,
    DomainScopeKind, ExtractOptions, PipelinePlan, PipelineTask, ScopeConfig, ScopeRecord,
    SubtaskMeta, SyncPolicy, TaskOptions,
};
use crate::domain::ports::ScopeRepository;

pub const EXTRACTOR_PLUGIN: &str = "gitextractor";
pub const DIFF_PLUGIN: &str = "refdiff";

/// Plan and domain scopes of one connection's blueprint scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BuiltPlan {
    pub plan: PipelinePlan,
    pub scopes: Vec<DomainScope>,
}

pub struct PipelinePlanBuilder {
    plugin: String,
    /// Tool-layer scope type used in generated domain ids, e.g. `GithubRepo`
    scope_type: String,
    scopes: Arc<dyn ScopeRepository>,
    catalog: Vec<SubtaskMeta>,
    proxy: Option<String>,
}

impl PipelinePlanBuilder {
    pub fn new(
        plugin: impl Into<String>,
        scope_type: impl Into<String>,
        scopes: Arc<dyn ScopeRepository>,
        catalog: Vec<SubtaskMeta>,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            scope_type: scope_type.into(),
            scopes,
            catalog,
            proxy: None,
        }
    }

    /// Proxy handed to extraction tasks
    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into()).filter(|p: &String| !p.is_empty());
        self
    }

    #[instrument(skip(self, bp_scopes, policy), fields(plugin = %self.plugin, scopes = bp_scopes.len()))]
    pub async fn build(
        &self,
        connection_id: u64,
        bp_scopes: &[BlueprintScope],
        policy: Option<&SyncPolicy>,
    ) -> CollectorResult<BuiltPlan> {
        if connection_id == 0 {
            return Err(CollectorError::Validation(
                "connection id is required".to_string(),
            ));
        }

        let mut graph = StageGraph::new();
        let mut domain_scopes = Vec::new();

        for (stage, bp_scope) in bp_scopes.iter().enumerate() {
            let (scope, config) = self
                .scopes
                .get_scope_and_config(connection_id, &bp_scope.scope_id)
                .await?
                .ok_or_else(|| {
                    CollectorError::Validation(format!(
                        "scope {} not found for connection {connection_id}",
                        bp_scope.scope_id
                    ))
                })?;
            let domain_id = self.domain_id(&scope);

            let primary = graph.add_task(self.collect_task(&scope, &config, policy)?, stage);

            if requests(&config, domain_type::CODE) {
                graph.add_task(self.extract_task(&scope, &domain_id)?, stage);
            }

            if let Some(settings) = &config.diff {
                graph.add_dependent(
                    PipelineTask {
                        plugin: DIFF_PLUGIN.to_string(),
                        subtasks: Vec::new(),
                        options: TaskOptions::Diff(DiffOptions {
                            repo_id: domain_id.clone(),
                            settings: settings.clone(),
                        }),
                    },
                    primary,
                )?;
            }

            domain_scopes.extend(domain_scopes_for(&scope, &config, &domain_id));
        }

        let plan = graph.into_plan()?;
        info!(
            stages = plan.len(),
            tasks = plan.task_count(),
            domain_scopes = domain_scopes.len(),
            "pipeline plan built"
        );
        Ok(BuiltPlan {
            plan,
            scopes: domain_scopes,
        })
    }

    fn domain_id(&self, scope: &ScopeRecord) -> String {
        generate_domain_id(
            &self.plugin,
            &self.scope_type,
            scope.connection_id,
            &scope.scope_id,
        )
    }

    fn collect_task(
        &self,
        scope: &ScopeRecord,
        config: &ScopeConfig,
        policy: Option<&SyncPolicy>,
    ) -> CollectorResult<PipelineTask> {
        Ok(PipelineTask {
            plugin: self.plugin.clone(),
            subtasks: select_subtasks(&self.catalog, &config.entities)?,
            options: TaskOptions::Collect(CollectOptions {
                connection_id: scope.connection_id,
                scope_id: scope.scope_id.clone(),
                name: scope.name.clone(),
                time_after: policy.and_then(|p| p.time_after),
                full_sync: policy.is_some_and(|p| p.full_sync),
            }),
        })
    }

    /// CODE needs the repository cloned, so a scope without a clone url
    /// cannot be planned.
    fn extract_task(&self, scope: &ScopeRecord, domain_id: &str) -> CollectorResult<PipelineTask> {
        let url = scope
            .clone_url
            .as_ref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                CollectorError::Validation(format!(
                    "scope {} requests {} but has no clone url",
                    scope.scope_id,
                    domain_type::CODE
                ))
            })?;
        Ok(PipelineTask {
            plugin: EXTRACTOR_PLUGIN.to_string(),
            subtasks: Vec::new(),
            options: TaskOptions::Extract(ExtractOptions {
                url: url.clone(),
                name: scope.name.clone(),
                repo_id: domain_id.to_string(),
                proxy: self.proxy.clone(),
            }),
        })
    }
}

/// Empty entity lists request every domain type.
fn requests(config: &ScopeConfig, domain_type: &str) -> bool {
    config.entities.is_empty() || config.requests(domain_type)
}

fn domain_scopes_for(scope: &ScopeRecord, config: &ScopeConfig, domain_id: &str) -> Vec<DomainScope> {
    let make = |kind, forked_from: Option<String>| DomainScope {
        id: domain_id.to_string(),
        name: scope.name.clone(),
        kind,
        forked_from,
    };

    let mut scopes = Vec::new();
    if [domain_type::CODE, domain_type::CODE_REVIEW, domain_type::CROSS]
        .iter()
        .any(|t| requests(config, t))
    {
        scopes.push(make(DomainScopeKind::Repo, scope.forked_from.clone()));
    }
    if requests(config, domain_type::CICD) {
        scopes.push(make(DomainScopeKind::CicdScope, None));
    }
    if requests(config, domain_type::TICKET) {
        scopes.push(make(DomainScopeKind::Board, None));
    }
    scopes
}
