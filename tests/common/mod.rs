//! Common test utilities for integration tests
//!
//! In-memory database, fast-retry configuration and collector contexts
//! pointed at a wiremock server.

#![allow(dead_code)]

use std::sync::Arc;

use silt::domain::models::{CollectionParams, Config};
use silt::domain::ports::RawDataStore;
use silt::infrastructure::database::{
    DatabaseConnection, RawDataRepositoryImpl, ScopeRepositoryImpl, SyncStateRepositoryImpl,
    TokenRepositoryImpl,
};
use silt::infrastructure::http::{ApiClient, Credentials};
use silt::services::CollectorContext;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Configuration with millisecond backoff and a budget that never blocks
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.http.max_retries = 2;
    config.http.initial_backoff_ms = 5;
    config.http.max_backoff_ms = 20;
    config.http.timeout_secs = 5;
    config.http.concurrency = 4;
    config.rate_limit.requests_per_hour = 3_600_000;
    config
}

/// Migrated in-memory database with every repository
pub struct TestDb {
    pub db: DatabaseConnection,
    pub raw: Arc<RawDataRepositoryImpl>,
    pub states: Arc<SyncStateRepositoryImpl>,
    pub scopes: Arc<ScopeRepositoryImpl>,
    pub tokens: Arc<TokenRepositoryImpl>,
}

pub async fn setup_test_db() -> TestDb {
    let db = DatabaseConnection::new("sqlite::memory:", 5)
        .await
        .expect("failed to create connection");
    db.migrate().await.expect("failed to run migrations");

    let pool = db.pool().clone();
    TestDb {
        raw: Arc::new(RawDataRepositoryImpl::new(pool.clone())),
        states: Arc::new(SyncStateRepositoryImpl::new(pool.clone())),
        scopes: Arc::new(ScopeRepositoryImpl::new(pool.clone())),
        tokens: Arc::new(TokenRepositoryImpl::new(pool)),
        db,
    }
}

/// Collector context against `endpoint`, backed by `db`
pub fn context(endpoint: &str, credentials: Credentials, db: &TestDb) -> CollectorContext {
    context_with(endpoint, credentials, db, test_config())
}

pub fn context_with(
    endpoint: &str,
    credentials: Credentials,
    db: &TestDb,
    config: Config,
) -> CollectorContext {
    let client = ApiClient::new(endpoint, credentials, &config).expect("failed to build client");
    CollectorContext::new(
        Arc::new(client),
        db.raw.clone(),
        db.states.clone(),
        Arc::new(config),
    )
}

/// All stored payloads of one collection, decoded, in insertion order
pub async fn stored(db: &TestDb, params: &CollectionParams) -> Vec<serde_json::Value> {
    db.raw
        .list_after(params, 0, 10_000)
        .await
        .expect("failed to list raw rows")
        .iter()
        .map(|record| record.decode().expect("raw row is not JSON"))
        .collect()
}
