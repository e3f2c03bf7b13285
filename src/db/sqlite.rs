//! SQLite storage backend using sqlx.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::schema::SCHEMA;
use super::traits::{KvBackend, StorageError, StorageResult};

/// Path value selecting a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Key-value backend stored in a single SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// `busy_timeout` bounds how long a writer waits on a locked database
    /// and also bounds pool acquisition.
    pub async fn open(
        path: &str,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> StorageResult<Self> {
        let in_memory = path == IN_MEMORY_PATH;
        let (options, max_connections) = if in_memory {
            // Each connection to `:memory:` is a separate database.
            debug!("Opening in-memory SQLite database");
            (SqliteConnectOptions::from_str("sqlite::memory:")?, 1)
        } else {
            info!(path = %path, "Opening SQLite database");
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StorageError::Backend(format!("cannot create {parent:?}: {e}"))
                    })?;
                }
            }
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(busy_timeout);
            (options, max_connections.max(1))
        };

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(busy_timeout);
        if in_memory {
            // Closing the only connection would drop the database with it.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let backend = Self { pool };
        backend.migrate().await?;
        Ok(backend)
    }

    /// Open a private in-memory database for testing.
    pub async fn open_in_memory() -> StorageResult<Self> {
        Self::open(IN_MEMORY_PATH, 1, Duration::from_secs(5)).await
    }

    async fn migrate(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check if a table exists.
    pub async fn table_exists(&self, table_name: &str) -> StorageResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl KvBackend for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let value = sqlx::query_scalar::<_, Vec<u8>>("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO kv_entries (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: &[u8]) -> StorageResult<bool> {
        let result = sqlx::query(
            "INSERT INTO kv_entries (key, value) VALUES (?, ?) ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        // substr() compares bytes exactly; LIKE would fold ASCII case.
        let rows = sqlx::query_as::<_, (String, Vec<u8>)>(
            "SELECT key, value FROM kv_entries WHERE substr(key, 1, ?) = ? ORDER BY key",
        )
        .bind(prefix.chars().count() as i64)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
