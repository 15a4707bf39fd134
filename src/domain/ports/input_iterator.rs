use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::CollectorResult;

/// Cursor over records that drive one request each (detail collection).
#[async_trait]
pub trait InputIterator: Send {
    /// Next driving record, or `None` when exhausted
    async fn next(&mut self) -> CollectorResult<Option<Value>>;
}
