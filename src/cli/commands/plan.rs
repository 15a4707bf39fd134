//! Implementation of the `silt plan` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::open_database;
use crate::cli::output::{output, table, truncate, CommandOutput};
use crate::domain::models::{
    BlueprintScope, Config, DomainScope, PipelinePlan, ScopeConfig, ScopeRecord, SubtaskMeta,
    SyncPolicy,
};
use crate::domain::ports::ScopeRepository;
use crate::infrastructure::database::ScopeRepositoryImpl;
use crate::services::PipelinePlanBuilder;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Blueprint YAML file
    #[arg(short, long)]
    pub blueprint: PathBuf,
}

/// Blueprint file: which scopes of one connection to collect and how.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    pub plugin: String,
    pub connection_id: u64,
    /// Tool-layer scope type used in domain ids
    pub scope_type: String,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub sync_policy: Option<SyncPolicy>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskMeta>,
    pub scopes: Vec<BlueprintScopeEntry>,
}

/// A scope reference, optionally carrying the scope record to store first.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintScopeEntry {
    pub scope_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub forked_from: Option<String>,
    #[serde(default)]
    pub scope_config: Option<ScopeConfig>,
}

impl Blueprint {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read blueprint {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse blueprint {}", path.display()))
    }

    fn blueprint_scopes(&self) -> Vec<BlueprintScope> {
        self.scopes
            .iter()
            .map(|s| BlueprintScope {
                scope_id: s.scope_id.clone(),
            })
            .collect()
    }
}

/// Store scopes declared inline in the blueprint.
pub async fn upsert_inline_scopes(
    repo: &dyn ScopeRepository,
    blueprint: &Blueprint,
) -> Result<usize> {
    let mut stored = 0;
    for entry in &blueprint.scopes {
        let Some(name) = &entry.name else { continue };
        let scope_config_id = match &entry.scope_config {
            Some(config) => Some(
                repo.upsert_scope_config(config)
                    .await
                    .context("Failed to store scope config")?,
            ),
            None => None,
        };
        repo.upsert_scope(&ScopeRecord {
            connection_id: blueprint.connection_id,
            scope_id: entry.scope_id.clone(),
            name: name.clone(),
            clone_url: entry.clone_url.clone(),
            forked_from: entry.forked_from.clone(),
            scope_config_id,
        })
        .await
        .with_context(|| format!("Failed to store scope {}", entry.scope_id))?;
        stored += 1;
    }
    Ok(stored)
}

#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub plan: PipelinePlan,
    pub scopes: Vec<DomainScope>,
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        if self.plan.is_empty() {
            return "Plan is empty".to_string();
        }
        let mut t = table(&["Stage", "Plugin", "Subtasks", "Options"]);
        for (index, stage) in self.plan.stages.iter().enumerate() {
            for task in stage {
                let options = serde_json::to_string(&task.options).unwrap_or_default();
                t.add_row(vec![
                    index.to_string(),
                    task.plugin.clone(),
                    truncate(&task.subtasks.join(", "), 60),
                    truncate(&options, 80),
                ]);
            }
        }

        let mut lines = vec![t.to_string()];
        if !self.scopes.is_empty() {
            let mut scopes = table(&["Domain scope", "Kind", "Name"]);
            for scope in &self.scopes {
                scopes.add_row(vec![
                    scope.id.clone(),
                    format!("{:?}", scope.kind),
                    scope.name.clone(),
                ]);
            }
            lines.push(scopes.to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: PlanArgs, config: &Config, json_mode: bool) -> Result<()> {
    let blueprint = Blueprint::from_file(&args.blueprint)?;

    let db = open_database(config).await?;
    let repo = Arc::new(ScopeRepositoryImpl::new(db.pool().clone()));
    upsert_inline_scopes(repo.as_ref(), &blueprint).await?;

    let mut builder = PipelinePlanBuilder::new(
        blueprint.plugin.clone(),
        blueprint.scope_type.clone(),
        repo,
        blueprint.subtasks.clone(),
    );
    if let Some(proxy) = &blueprint.proxy {
        builder = builder.with_proxy(proxy.clone());
    }

    let built = builder
        .build(
            blueprint.connection_id,
            &blueprint.blueprint_scopes(),
            blueprint.sync_policy.as_ref(),
        )
        .await
        .context("Failed to build pipeline plan")?;
    db.close().await;

    output(
        &PlanOutput {
            plan: built.plan,
            scopes: built.scopes,
        },
        json_mode,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blueprint_yaml() {
        let yaml = r#"
plugin: github
connectionId: 1
scopeType: GithubRepo
syncPolicy:
  timeAfter: "2023-01-01T00:00:00Z"
subtasks:
  - name: collectRuns
    domainTypes: [CICD]
  - name: collectIssues
    enabledByDefault: false
    domainTypes: [TICKET]
scopes:
  - scopeId: "12345"
    name: org/repo
    cloneUrl: https://github.com/org/repo.git
    scopeConfig:
      entities: [CICD, CODE]
      diff:
        tagsLimit: 10
  - scopeId: "678"
"#;
        let blueprint: Blueprint = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(blueprint.connection_id, 1);
        assert!(blueprint.sync_policy.as_ref().unwrap().time_after.is_some());
        assert!(!blueprint.subtasks[1].enabled_by_default);
        assert!(blueprint.subtasks[0].enabled_by_default);
        assert_eq!(blueprint.scopes.len(), 2);
        let config = blueprint.scopes[0].scope_config.as_ref().unwrap();
        assert_eq!(config.diff.as_ref().unwrap()["tagsLimit"], 10);
        assert!(blueprint.scopes[1].name.is_none());
        assert_eq!(blueprint.blueprint_scopes()[1].scope_id, "678");
    }
}
