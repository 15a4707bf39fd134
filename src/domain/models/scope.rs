use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool-specific record of one scope (a repository, a service, a board).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRecord {
    pub connection_id: u64,
    pub scope_id: String,
    /// Human-readable name, e.g. `org/repo`
    pub name: String,
    /// Clone URL for repository scopes
    #[serde(default)]
    pub clone_url: Option<String>,
    /// Parent URL of a forked repository
    #[serde(default)]
    pub forked_from: Option<String>,
    #[serde(default)]
    pub scope_config_id: Option<i64>,
}

/// Per-scope transformation settings: which domain entities to produce and
/// which dependent tasks to schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeConfig {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    /// Requested domain types; empty means all
    #[serde(default)]
    pub entities: Vec<String>,
    /// Settings of a diff task to run in the following stage
    #[serde(default)]
    pub diff: Option<Map<String, Value>>,
}

impl ScopeConfig {
    pub fn requests(&self, domain_type: &str) -> bool {
        self.entities.iter().any(|e| e == domain_type)
    }
}

/// Scope reference inside a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintScope {
    pub scope_id: String,
}

/// Domain-layer scope produced alongside a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainScope {
    pub id: String,
    pub name: String,
    pub kind: DomainScopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_from: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainScopeKind {
    Repo,
    CicdScope,
    Board,
}
