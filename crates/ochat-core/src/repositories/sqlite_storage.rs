use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::error::{RepositoryError, RepositoryResult};
use super::storage_backend::{BoxFuture, StorageBackend};

/// Migrations applied in order. Each entry is (version, sql).
/// To add a new migration: append a tuple with the next version number and its SQL.
/// Never edit or remove existing entries; existing databases depend on them.
const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS kv_store (
        key        TEXT    PRIMARY KEY,
        value      TEXT    NOT NULL,
        updated_at INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_kv_store_updated_at
        ON kv_store (updated_at DESC);",
)];

/// SQLite-backed key/value storage.
///
/// Uses WAL journal mode so several processes can read while one writes.
/// `SqlitePool` is internally reference-counted and cheap to clone.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) the database at the platform-specific data path.
    pub async fn new() -> RepositoryResult<Self> {
        Self::open(&Self::db_path()?).await
    }

    pub async fn open(db_path: &Path) -> RepositoryResult<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(RepositoryError::from_io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        info!(path = %db_path.display(), "Opened SQLite storage");

        Ok(Self { pool })
    }

    /// Private in-memory database, for tests.
    pub async fn in_memory() -> RepositoryResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // A single connection that never expires, otherwise the database vanishes
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Create the schema_version table if absent, then apply any pending migrations.
    async fn run_migrations(pool: &SqlitePool) -> RepositoryResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        // Seed version 0 if the table is empty (fresh database).
        sqlx::query(
            "INSERT INTO schema_version (version) SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM schema_version)",
        )
        .execute(pool)
        .await?;

        let current: i64 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(pool)
            .await?;

        for (version, sql) in MIGRATIONS {
            if *version > current {
                info!(version, "Applying schema migration");
                // sqlx doesn't support multiple statements in a single query call,
                // so split on ';' and execute each statement individually.
                for statement in sql.split(';') {
                    let trimmed = statement.trim();
                    if !trimmed.is_empty() {
                        sqlx::query(trimmed).execute(pool).await?;
                    }
                }
                sqlx::query("UPDATE schema_version SET version = ?")
                    .bind(version)
                    .execute(pool)
                    .await?;
            }
        }

        Ok(())
    }

    fn db_path() -> RepositoryResult<PathBuf> {
        dirs::data_dir()
            .ok_or_else(|| RepositoryError::InitializationError {
                message: "Cannot find data directory".into(),
            })
            .map(|p| p.join("ochat").join("storage.db"))
    }
}

impl StorageBackend for SqliteStorage {
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<String>>> {
        let pool = self.pool.clone();
        let key = key.to_string();
        Box::pin(async move {
            let value: Option<String> =
                sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
                    .bind(&key)
                    .fetch_optional(&pool)
                    .await?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, RepositoryResult<()>> {
        let pool = self.pool.clone();
        let key = key.to_string();
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value      = excluded.value,
                    updated_at = excluded.updated_at",
            )
            .bind(&key)
            .bind(&value)
            .bind(chrono::Utc::now().timestamp_millis())
            .execute(&pool)
            .await?;

            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let pool = self.pool.clone();
        let key = key.to_string();
        Box::pin(async move {
            sqlx::query("DELETE FROM kv_store WHERE key = ?")
                .bind(&key)
                .execute(&pool)
                .await?;
            Ok(())
        })
    }

    fn keys(&self) -> BoxFuture<'static, RepositoryResult<Vec<String>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let keys: Vec<String> =
                sqlx::query_scalar("SELECT key FROM kv_store ORDER BY updated_at DESC")
                    .fetch_all(&pool)
                    .await?;
            Ok(keys)
        })
    }
}
