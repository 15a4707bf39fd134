use async_trait::async_trait;

use crate::domain::models::{ScopeConfig, ScopeRecord};
use crate::domain::ports::errors::DatabaseError;

/// Repository port for tool-specific scopes and their configs
#[async_trait]
pub trait ScopeRepository: Send + Sync {
    async fn get_scope(
        &self,
        connection_id: u64,
        scope_id: &str,
    ) -> Result<Option<ScopeRecord>, DatabaseError>;

    async fn get_scope_config(&self, id: i64) -> Result<Option<ScopeConfig>, DatabaseError>;

    /// Insert or replace a scope keyed by connection and scope id
    async fn upsert_scope(&self, scope: &ScopeRecord) -> Result<(), DatabaseError>;

    /// Insert a config (or replace it when `id` is set); returns its id
    async fn upsert_scope_config(&self, config: &ScopeConfig) -> Result<i64, DatabaseError>;

    /// Scope plus its config; a missing config yields the default config
    async fn get_scope_and_config(
        &self,
        connection_id: u64,
        scope_id: &str,
    ) -> Result<Option<(ScopeRecord, ScopeConfig)>, DatabaseError> {
        let Some(scope) = self.get_scope(connection_id, scope_id).await? else {
            return Ok(None);
        };
        let config = match scope.scope_config_id {
            Some(id) => self.get_scope_config(id).await?.unwrap_or_default(),
            None => ScopeConfig::default(),
        };
        Ok(Some((scope, config)))
    }
}
