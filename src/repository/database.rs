use anyhow::{Context, Result};
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Pool, QueryBuilder, Row, Sqlite, Transaction};
use std::borrow::Cow;
use std::str::FromStr;

use super::SCHEMA_VERSION;

/// A cached scanner state row (zero-copy friendly)
#[derive(Debug, Clone)]
pub struct CacheRecord<'a> {
    pub commit_id: Cow<'a, str>,
    pub lineage: Cow<'a, str>,
    pub config_hash: Cow<'a, str>,
    pub checksum: Cow<'a, str>,
    pub state: Cow<'a, str>,
}

impl<'a> CacheRecord<'a> {
    pub fn new(
        commit_id: impl Into<Cow<'a, str>>,
        lineage: impl Into<Cow<'a, str>>,
        config_hash: impl Into<Cow<'a, str>>,
        checksum: impl Into<Cow<'a, str>>,
        state: impl Into<Cow<'a, str>>,
    ) -> Self {
        Self {
            commit_id: commit_id.into(),
            lineage: lineage.into(),
            config_hash: config_hash.into(),
            checksum: checksum.into(),
            state: state.into(),
        }
    }
}

/// Database abstraction for SQLite operations
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Configure connection options with PRAGMAs applied to every connection
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Initialize database schema, returns true if schema was rebuilt
    pub async fn init_schema(&self) -> Result<bool> {
        // Create metadata table first (needed to check version)
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"
        ).execute(&self.pool).await?;

        let stored_version: Option<String> = sqlx::query("SELECT value FROM metadata WHERE key = 'schema_version'")
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get("value"));

        let needs_rebuild = stored_version.as_deref() != Some(SCHEMA_VERSION);

        if needs_rebuild {
            if let Some(old) = &stored_version {
                tracing::info!(from = %old, to = SCHEMA_VERSION, "cache schema changed, rebuilding");
            }
            sqlx::query("DROP TABLE IF EXISTS scan_cache").execute(&self.pool).await?;
            sqlx::query("DELETE FROM metadata").execute(&self.pool).await?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scan_cache (
                commit_id TEXT NOT NULL,
                lineage TEXT NOT NULL,
                config_hash TEXT NOT NULL,
                checksum TEXT NOT NULL,
                state TEXT NOT NULL,
                PRIMARY KEY (commit_id, lineage)
            )"
        ).execute(&self.pool).await?;

        if needs_rebuild {
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)")
                .bind(SCHEMA_VERSION)
                .execute(&self.pool)
                .await?;
        }

        Ok(needs_rebuild)
    }

    /// Get metadata value by key
    pub async fn get_metadata(&self, key: &str) -> Option<String> {
        sqlx::query("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .map(|row| row.get("value"))
    }

    /// Set metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Load the cached state of a commit reached through `lineage`
    pub async fn load_cache_record(&self, commit_id: &str, lineage: &str) -> Result<Option<CacheRecord<'static>>> {
        let row = sqlx::query(
            "SELECT commit_id, lineage, config_hash, checksum, state FROM scan_cache
             WHERE commit_id = ? AND lineage = ?"
        )
        .bind(commit_id)
        .bind(lineage)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| CacheRecord::new(
            row.get::<String, _>("commit_id"),
            row.get::<String, _>("lineage"),
            row.get::<String, _>("config_hash"),
            row.get::<String, _>("checksum"),
            row.get::<String, _>("state"),
        )))
    }

    /// Number of cached states
    pub async fn cache_entry_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Delete every cached state
    pub async fn clear_cache(&self) -> Result<()> {
        sqlx::query("DELETE FROM scan_cache").execute(&self.pool).await?;
        Ok(())
    }

    /// Save cache records with a callback for progress.
    /// Existing `(commit_id, lineage)` rows are never overwritten.
    pub async fn save_cache_records_with_callback<F>(
        &self,
        records: &[CacheRecord<'_>],
        mut on_progress: F,
    ) -> Result<()>
    where
        F: FnMut(usize),
    {
        let mut tx = self.pool.begin().await?;
        self.save_cache_records_in_tx(&mut tx, records, &mut on_progress)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_cache_records_in_tx<F>(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        records: &[CacheRecord<'_>],
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(usize),
    {
        // 5 bound parameters per row, kept under SQLite's variable limit
        const BATCH_SIZE: usize = 1000;

        for chunk in records.chunks(BATCH_SIZE) {
            if chunk.is_empty() {
                continue;
            }

            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO scan_cache (commit_id, lineage, config_hash, checksum, state) "
            );
            qb.push_values(chunk, |mut row, record| {
                row.push_bind(record.commit_id.as_ref())
                    .push_bind(record.lineage.as_ref())
                    .push_bind(record.config_hash.as_ref())
                    .push_bind(record.checksum.as_ref())
                    .push_bind(record.state.as_ref());
            });
            qb.build().execute(&mut **tx).await?;

            on_progress(chunk.len());
        }

        Ok(())
    }
}
