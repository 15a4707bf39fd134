use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::fetch_executor::FetchExecutor;
use crate::domain::models::Config;
use crate::domain::ports::{RawDataStore, SyncStateRepository};
use crate::infrastructure::http::ApiClient;

/// Shared collaborators of every collector run on one connection.
///
/// Clients (and with them the throttle and token provider) are shared by
/// all collectors of a connection; cloning the context is cheap.
#[derive(Clone)]
pub struct CollectorContext {
    pub client: Arc<ApiClient>,
    pub raw_store: Arc<dyn RawDataStore>,
    pub sync_states: Arc<dyn SyncStateRepository>,
    pub config: Arc<Config>,
    pub cancel: CancellationToken,
}

impl CollectorContext {
    pub fn new(
        client: Arc<ApiClient>,
        raw_store: Arc<dyn RawDataStore>,
        sync_states: Arc<dyn SyncStateRepository>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            client,
            raw_store,
            sync_states,
            config,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Executor bounded by `http.concurrency`, sharing this context's client
    /// and applying the configured username exclude list.
    pub fn executor(&self) -> FetchExecutor {
        FetchExecutor::new(
            Arc::clone(&self.client),
            Arc::clone(&self.raw_store),
            self.config.http.concurrency,
            self.cancel.clone(),
        )
        .with_user_filter(self.config.collector.clone())
    }
}
