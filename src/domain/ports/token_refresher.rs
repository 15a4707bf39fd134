use async_trait::async_trait;

use crate::domain::errors::CollectorResult;
use crate::domain::models::RefreshedToken;

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> CollectorResult<RefreshedToken>;
}
