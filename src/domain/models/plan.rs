use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CollectionParams, SyncPolicy};

/// Domain entity types a scope may request.
pub mod domain_type {
    pub const CROSS: &str = "CROSS";
    pub const CODE: &str = "CODE";
    pub const TICKET: &str = "TICKET";
    pub const CODE_REVIEW: &str = "CODEREVIEW";
    pub const CICD: &str = "CICD";
    pub const CODE_QUALITY: &str = "CODEQUALITY";

    pub const ALL: [&str; 6] = [CROSS, CODE, TICKET, CODE_REVIEW, CICD, CODE_QUALITY];
}

/// Catalog entry describing one subtask a plugin can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskMeta {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled_by_default: bool,
    #[serde(default)]
    pub domain_types: Vec<String>,
}

const fn default_enabled() -> bool {
    true
}

impl SubtaskMeta {
    pub fn new(name: impl Into<String>, domain_types: &[&str]) -> Self {
        Self {
            name: name.into(),
            enabled_by_default: true,
            domain_types: domain_types.iter().map(|t| (*t).to_string()).collect(),
        }
    }
}

/// Options of a primary collection task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectOptions {
    pub connection_id: u64,
    pub scope_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub full_sync: bool,
}

impl CollectOptions {
    /// Params of the raw table `table` collected by this task.
    pub fn collection_params(&self, table: impl Into<String>) -> CollectionParams {
        CollectionParams::new(self.connection_id, self.scope_id.clone(), table)
    }

    pub const fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            time_after: self.time_after,
            full_sync: self.full_sync,
        }
    }
}

/// Options of a repository extraction task scheduled next to the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOptions {
    pub url: String,
    pub name: String,
    pub repo_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

/// Options of a diff task; everything besides `repoId` comes from the scope config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOptions {
    pub repo_id: String,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

/// Task options resolved once when the plan is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskOptions {
    Collect(CollectOptions),
    Extract(ExtractOptions),
    Diff(DiffOptions),
}

/// One unit of work handed to the task runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTask {
    pub plugin: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<String>,
    pub options: TaskOptions,
}

/// Tasks that may run concurrently.
pub type PipelineStage = Vec<PipelineTask>;

/// Ordered stages; stage `n + 1` starts after every task of stage `n` finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelinePlan {
    pub stages: Vec<PipelineStage>,
}

impl PipelinePlan {
    pub const fn new(stages: Vec<PipelineStage>) -> Self {
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }

    pub fn task_count(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    /// Merge plans that may run side by side: stage `n` of the result holds
    /// stage `n` of every input.
    pub fn parallelize(plans: impl IntoIterator<Item = Self>) -> Self {
        let mut merged: Vec<PipelineStage> = Vec::new();
        for plan in plans {
            for (index, stage) in plan.stages.into_iter().enumerate() {
                if index >= merged.len() {
                    merged.push(Vec::new());
                }
                merged[index].extend(stage);
            }
        }
        Self::new(merged)
    }

    /// Merge plans that must run one after the other.
    pub fn sequentialize(plans: impl IntoIterator<Item = Self>) -> Self {
        Self::new(plans.into_iter().flat_map(|plan| plan.stages).collect())
    }
}

/// Domain-layer id: `<plugin>:<Type>:<connectionId>:<scopeId>`.
pub fn generate_domain_id(plugin: &str, entity_type: &str, connection_id: u64, scope_id: &str) -> String {
    format!("{plugin}:{entity_type}:{connection_id}:{scope_id}")
}
