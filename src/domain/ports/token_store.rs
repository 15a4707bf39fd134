use async_trait::async_trait;

use crate::domain::models::TokenState;
use crate::domain::ports::errors::DatabaseError;

/// Durable storage for refreshed connection tokens
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self, connection_id: u64) -> Result<Option<TokenState>, DatabaseError>;

    async fn save(&self, connection_id: u64, token: &TokenState) -> Result<(), DatabaseError>;
}
