use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::utils::{format_datetime, parse_optional_datetime};
use crate::domain::models::TokenState;
use crate::domain::ports::errors::DatabaseError;
use crate::domain::ports::TokenStore;

/// `SQLite` implementation of `TokenStore`
pub struct TokenRepositoryImpl {
    pool: SqlitePool,
}

impl TokenRepositoryImpl {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for TokenRepositoryImpl {
    async fn load(&self, connection_id: u64) -> Result<Option<TokenState>, DatabaseError> {
        let row = sqlx::query(
            r"
            SELECT access_token, refresh_token, expires_at, refresh_expires_at, generation
            FROM connection_tokens
            WHERE connection_id = ?
            ",
        )
        .bind(connection_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let expires_at: Option<String> = row.try_get("expires_at")?;
        let refresh_expires_at: Option<String> = row.try_get("refresh_expires_at")?;
        let generation: i64 = row.try_get("generation")?;

        Ok(Some(TokenState {
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            expires_at: parse_optional_datetime(expires_at.as_deref())?,
            refresh_expires_at: parse_optional_datetime(refresh_expires_at.as_deref())?,
            generation: generation.max(0) as u64,
        }))
    }

    async fn save(&self, connection_id: u64, token: &TokenState) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO connection_tokens
                (connection_id, access_token, refresh_token, expires_at, refresh_expires_at, generation)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (connection_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                refresh_expires_at = excluded.refresh_expires_at,
                generation = excluded.generation,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            ",
        )
        .bind(connection_id as i64)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at.as_ref().map(format_datetime))
        .bind(token.refresh_expires_at.as_ref().map(format_datetime))
        .bind(token.generation as i64)
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

    #[tokio::test]
    async fn test_token_round_trip() {
        let db = DatabaseConnection::new("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        let repo = TokenRepositoryImpl::new(db.pool().clone());

        assert!(repo.load(7).await.unwrap().is_none());

        let mut token = TokenState {
            access_token: "ghu_one".to_string(),
            refresh_token: "ghr_one".to_string(),
            expires_at: Some(Utc::now() + Duration::hours(8)),
            refresh_expires_at: None,
            generation: 1,
        };
        repo.save(7, &token).await.unwrap();
        assert_eq!(repo.load(7).await.unwrap().unwrap(), token);

        token.access_token = "ghu_two".to_string();
        token.generation = 2;
        repo.save(7, &token).await.unwrap();
        let loaded = repo.load(7).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "ghu_two");
        assert_eq!(loaded.generation, 2);
    }
}
