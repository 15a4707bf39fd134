use async_trait::async_trait;

use crate::domain::models::{CollectionParams, RawRecord, WriteMode};
use crate::domain::ports::errors::DatabaseError;

/// Storage port for raw payload tables, one table per entity.
#[async_trait]
pub trait RawDataStore: Send + Sync {
    /// Create the raw table for `params` if it does not exist yet
    async fn ensure_table(&self, params: &CollectionParams) -> Result<(), DatabaseError>;

    /// Persist a batch of rows in order; returns the number of rows written
    async fn save(
        &self,
        params: &CollectionParams,
        records: &[RawRecord],
        mode: WriteMode,
    ) -> Result<usize, DatabaseError>;

    /// Count rows stored for `params`
    async fn count(&self, params: &CollectionParams) -> Result<i64, DatabaseError>;

    /// Rows for `params` with id greater than `after_id`, ordered by id
    async fn list_after(
        &self,
        params: &CollectionParams,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<RawRecord>, DatabaseError>;
}
