use async_trait::async_trait;

use crate::domain::models::{CollectionParams, SyncState};
use crate::domain::ports::errors::DatabaseError;

/// Repository port for the latest successful run of each collection
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Load the state for `params`, if a run ever succeeded
    async fn get(&self, params: &CollectionParams) -> Result<Option<SyncState>, DatabaseError>;

    /// Insert or replace the state for `state.params`
    async fn save(&self, state: &SyncState) -> Result<(), DatabaseError>;
}
