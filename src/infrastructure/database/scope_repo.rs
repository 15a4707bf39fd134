use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::models::{ScopeConfig, ScopeRecord};
use crate::domain::ports::errors::DatabaseError;
use crate::domain::ports::ScopeRepository;

/// `SQLite` implementation of `ScopeRepository`
pub struct ScopeRepositoryImpl {
    pool: SqlitePool,
}

impl ScopeRepositoryImpl {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopeRepository for ScopeRepositoryImpl {
    async fn get_scope(
        &self,
        connection_id: u64,
        scope_id: &str,
    ) -> Result<Option<ScopeRecord>, DatabaseError> {
        let row = sqlx::query(
            r"
            SELECT name, clone_url, forked_from, scope_config_id
            FROM scopes
            WHERE connection_id = ? AND scope_id = ?
            ",
        )
        .bind(connection_id as i64)
        .bind(scope_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<ScopeRecord, DatabaseError> {
            Ok(ScopeRecord {
                connection_id,
                scope_id: scope_id.to_string(),
                name: row.try_get("name")?,
                clone_url: row.try_get("clone_url")?,
                forked_from: row.try_get("forked_from")?,
                scope_config_id: row.try_get("scope_config_id")?,
            })
        })
        .transpose()
    }

    async fn get_scope_config(&self, id: i64) -> Result<Option<ScopeConfig>, DatabaseError> {
        let row = sqlx::query("SELECT id, name, entities, diff FROM scope_configs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<ScopeConfig, DatabaseError> {
            let entities: String = row.try_get("entities")?;
            let diff: Option<String> = row.try_get("diff")?;
            Ok(ScopeConfig {
                id: Some(row.try_get("id")?),
                name: row.try_get("name")?,
                entities: serde_json::from_str(&entities)?,
                diff: diff.as_deref().map(serde_json::from_str).transpose()?,
            })
        })
        .transpose()
    }

    async fn upsert_scope(&self, scope: &ScopeRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO scopes (connection_id, scope_id, name, clone_url, forked_from, scope_config_id)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (connection_id, scope_id) DO UPDATE SET
                name = excluded.name,
                clone_url = excluded.clone_url,
                forked_from = excluded.forked_from,
                scope_config_id = excluded.scope_config_id
            ",
        )
        .bind(scope.connection_id as i64)
        .bind(&scope.scope_id)
        .bind(&scope.name)
        .bind(&scope.clone_url)
        .bind(&scope.forked_from)
        .bind(scope.scope_config_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_scope_config(&self, config: &ScopeConfig) -> Result<i64, DatabaseError> {
        let entities = serde_json::to_string(&config.entities)?;
        let diff = config.diff.as_ref().map(serde_json::to_string).transpose()?;

        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO scope_configs (id, name, entities, diff)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                entities = excluded.entities,
                diff = excluded.diff
            RETURNING id
            ",
        )
        .bind(config.id)
        .bind(&config.name)
        .bind(entities)
        .bind(diff)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::DatabaseConnection;

    async fn repo() -> ScopeRepositoryImpl {
        let db = DatabaseConnection::new("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        ScopeRepositoryImpl::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_scope_and_config() {
        let repo = repo().await;
        let mut diff = serde_json::Map::new();
        diff.insert("tagsLimit".to_string(), serde_json::json!(10));

        let config_id = repo
            .upsert_scope_config(&ScopeConfig {
                id: None,
                name: "default".to_string(),
                entities: vec!["CODE".to_string()],
                diff: Some(diff),
            })
            .await
            .unwrap();

        repo.upsert_scope(&ScopeRecord {
            connection_id: 1,
            scope_id: "12345".to_string(),
            name: "org/repo".to_string(),
            clone_url: Some("https://github.com/org/repo.git".to_string()),
            forked_from: None,
            scope_config_id: Some(config_id),
        })
        .await
        .unwrap();

        let (scope, config) = repo.get_scope_and_config(1, "12345").await.unwrap().unwrap();
        assert_eq!(scope.name, "org/repo");
        assert_eq!(config.id, Some(config_id));
        assert!(config.requests("CODE"));
        assert_eq!(config.diff.unwrap()["tagsLimit"], 10);

        assert!(repo.get_scope_and_config(1, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scope_without_config_gets_default() {
        let repo = repo().await;
        repo.upsert_scope(&ScopeRecord {
            connection_id: 2,
            scope_id: "svc".to_string(),
            name: "Service".to_string(),
            clone_url: None,
            forked_from: None,
            scope_config_id: None,
        })
        .await
        .unwrap();

        let (_, config) = repo.get_scope_and_config(2, "svc").await.unwrap().unwrap();
        assert_eq!(config, ScopeConfig::default());
    }
}
