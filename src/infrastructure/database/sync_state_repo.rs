use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::utils::{format_datetime, parse_optional_datetime};
use crate::domain::models::{CollectionParams, SyncState};
use crate::domain::ports::errors::DatabaseError;
use crate::domain::ports::SyncStateRepository;

/// `SQLite` implementation of `SyncStateRepository`
pub struct SyncStateRepositoryImpl {
    pool: SqlitePool,
}

impl SyncStateRepositoryImpl {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncStateRepository for SyncStateRepositoryImpl {
    async fn get(&self, params: &CollectionParams) -> Result<Option<SyncState>, DatabaseError> {
        let row = sqlx::query(
            r"
            SELECT time_after, latest_success_start, latest_success_end
            FROM collector_latest_states
            WHERE raw_data_table = ? AND raw_data_params = ?
            ",
        )
        .bind(params.raw_table())
        .bind(params.key())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let time_after: Option<String> = row.try_get("time_after")?;
        let start: Option<String> = row.try_get("latest_success_start")?;
        let end: Option<String> = row.try_get("latest_success_end")?;

        Ok(Some(SyncState {
            params: params.clone(),
            time_after: parse_optional_datetime(time_after.as_deref())?,
            latest_success_start: parse_optional_datetime(start.as_deref())?,
            latest_success_end: parse_optional_datetime(end.as_deref())?,
        }))
    }

    async fn save(&self, state: &SyncState) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO collector_latest_states
                (raw_data_table, raw_data_params, time_after, latest_success_start, latest_success_end)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (raw_data_table, raw_data_params) DO UPDATE SET
                time_after = excluded.time_after,
                latest_success_start = excluded.latest_success_start,
                latest_success_end = excluded.latest_success_end,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            ",
        )
        .bind(state.params.raw_table())
        .bind(state.params.key())
        .bind(state.time_after.as_ref().map(format_datetime))
        .bind(state.latest_success_start.as_ref().map(format_datetime))
        .bind(state.latest_success_end.as_ref().map(format_datetime))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::DatabaseConnection;
    use chrono::{Duration, Utc};

    async fn repo() -> SyncStateRepositoryImpl {
        let db = DatabaseConnection::new("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        SyncStateRepositoryImpl::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_missing_state() {
        let repo = repo().await;
        let params = CollectionParams::new(1, "12345", "github_api_runs");
        assert!(repo.get(&params).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_update() {
        let repo = repo().await;
        let params = CollectionParams::new(1, "12345", "github_api_runs");
        let start = Utc::now();

        let mut state = SyncState::empty(params.clone());
        state.latest_success_start = Some(start);
        state.latest_success_end = Some(start + Duration::seconds(3));
        repo.save(&state).await.unwrap();

        let loaded = repo.get(&params).await.unwrap().unwrap();
        assert_eq!(loaded, state);

        state.latest_success_start = Some(start + Duration::hours(1));
        repo.save(&state).await.unwrap();
        let loaded = repo.get(&params).await.unwrap().unwrap();
        assert_eq!(loaded.latest_success_start, Some(start + Duration::hours(1)));

        let other = CollectionParams::new(1, "12345", "github_api_jobs");
        assert!(repo.get(&other).await.unwrap().is_none(), "table is part of the key");
    }
}
