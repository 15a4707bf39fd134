use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

use super::utils::{checked_table_name, format_datetime, parse_datetime};
use crate::domain::models::{CollectionParams, RawRecord, WriteMode};
use crate::domain::ports::errors::DatabaseError;
use crate::domain::ports::RawDataStore;

/// `SQLite` implementation of `RawDataStore`
///
/// Each entity gets its own `_raw_<table>` table, created on first use.
pub struct RawDataRepositoryImpl {
    pool: SqlitePool,
    known_tables: Mutex<HashSet<String>>,
}

impl RawDataRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            known_tables: Mutex::new(HashSet::new()),
        }
    }

    fn is_known(&self, table: &str) -> bool {
        self.known_tables
            .lock()
            .map(|tables| tables.contains(table))
            .unwrap_or(false)
    }

    fn remember(&self, table: &str) {
        if let Ok(mut tables) = self.known_tables.lock() {
            tables.insert(table.to_string());
        }
    }
}

#[async_trait]
impl RawDataStore for RawDataRepositoryImpl {
    async fn ensure_table(&self, params: &CollectionParams) -> Result<(), DatabaseError> {
        let raw_table = params.raw_table();
        let table = checked_table_name(&raw_table)?;
        if self.is_known(table) {
            return Ok(());
        }

        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                params TEXT NOT NULL,
                data BLOB NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                input BLOB,
                created_at TEXT NOT NULL
            )
            "
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx{table}_params_url ON {table}(params, url)"
        ))
        .execute(&self.pool)
        .await?;

        self.remember(table);
        Ok(())
    }

    async fn save(
        &self,
        params: &CollectionParams,
        records: &[RawRecord],
        mode: WriteMode,
    ) -> Result<usize, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.ensure_table(params).await?;
        let raw_table = params.raw_table();
        let table = checked_table_name(&raw_table)?;
        let key = params.key();

        let mut tx = self.pool.begin().await?;

        if mode == WriteMode::ReplaceByUrl {
            let urls: BTreeSet<&str> = records.iter().map(|r| r.url.as_str()).collect();
            for url in urls {
                sqlx::query(&format!("DELETE FROM {table} WHERE params = ? AND url = ?"))
                    .bind(&key)
                    .bind(url)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let insert = format!(
            "INSERT INTO {table} (params, data, url, input, created_at) VALUES (?, ?, ?, ?, ?)"
        );
        for record in records {
            sqlx::query(&insert)
                .bind(&key)
                .bind(&record.data)
                .bind(&record.url)
                .bind(record.input.as_deref())
                .bind(format_datetime(&record.created_at))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    async fn count(&self, params: &CollectionParams) -> Result<i64, DatabaseError> {
        self.ensure_table(params).await?;
        let raw_table = params.raw_table();
        let table = checked_table_name(&raw_table)?;

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE params = ?"))
            .bind(params.key())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_after(
        &self,
        params: &CollectionParams,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<RawRecord>, DatabaseError> {
        self.ensure_table(params).await?;
        let raw_table = params.raw_table();
        let table = checked_table_name(&raw_table)?;

        let rows = sqlx::query(&format!(
            r"
            SELECT id, data, url, input, created_at
            FROM {table}
            WHERE params = ? AND id > ?
            ORDER BY id
            LIMIT ?
            "
        ))
        .bind(params.key())
        .bind(after_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<RawRecord, DatabaseError> {
                let created_at: String = row.try_get("created_at")?;
                Ok(RawRecord {
                    id: Some(row.try_get("id")?),
                    params: params.clone(),
                    data: row.try_get("data")?,
                    url: row.try_get("url")?,
                    input: row.try_get("input")?,
                    created_at: parse_datetime(&created_at)?,
                })
            })
            .collect()
    }
}
