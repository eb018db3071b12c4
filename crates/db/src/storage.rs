//! Opens and migrates the embedded database; exposes transactions and a
//! health check. The process exclusively owns this connection pool — see
//! `kanban-core-db`'s crate docs for the single-writer assumption.

use std::str::FromStr;
use std::time::{Duration, Instant};

use kanban_core_utils::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::StorageError;
use crate::{migrations, seeds};

#[derive(Clone)]
pub struct StorageEngine {
    pool: SqlitePool,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthStatus {
    pub connected: bool,
    pub responsive: bool,
    pub stats: HealthStats,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct HealthStats {
    pub board_count: i64,
    pub task_count: i64,
    pub schema_version: String,
}

impl StorageEngine {
    /// Open (creating if absent) the database at `config.path`, apply
    /// pragmas, and ensure the schema is migrated to the latest version.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StorageError> {
        if let Some(parent) = std::path::Path::new(&config.path).parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path))
            .map_err(|e| StorageError::SchemaInvalid(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .pragma("mmap_size", "268435456")
            .pragma("cache_size", format!("-{}", config.memory_limit_bytes / 1024))
            .pragma("auto_vacuum", "incremental");

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let engine = Self { pool };
        engine.ensure_schema_bootstrap().await?;
        engine.migrate().await?;
        Ok(engine)
    }

    /// Construct directly around an already-open pool (tests, in-memory db).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema_bootstrap(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_info (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                id TEXT PRIMARY KEY,
                applied_at DATETIME NOT NULL DEFAULT (datetime('now', 'subsec')),
                checksum TEXT NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS seed_status (
                name TEXT PRIMARY KEY,
                applied_at DATETIME NOT NULL DEFAULT (datetime('now', 'subsec')),
                checksum TEXT NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        let applied = migrations::up(&self.pool, None).await?;
        if applied > 0 {
            tracing::info!("applied {applied} migration(s)");
        }
        let version = migrations::all_migrations()
            .last()
            .map(|m| m.id.to_string())
            .unwrap_or_default();
        sqlx::query("INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)")
            .bind(&version)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Run idempotent seed data, skipping seeds already recorded in
    /// `seed_status` unless `force` is set.
    pub async fn seed(&self, force: bool) -> Result<(), StorageError> {
        seeds::run_all(&self.pool, force).await
    }

    pub async fn health_check(&self) -> HealthStatus {
        let start = Instant::now();
        let responsive = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok_and(|v| v == 1)
            && start.elapsed() < Duration::from_secs(1);

        let board_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM boards")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let task_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let schema_version: String =
            sqlx::query_scalar("SELECT value FROM schema_info WHERE key = 'version'")
                .fetch_optional(&self.pool)
                .await
                .ok()
                .flatten()
                .unwrap_or_default();

        HealthStatus {
            connected: true,
            responsive,
            stats: HealthStats {
                board_count,
                task_count,
                schema_version,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn open_memory() -> StorageEngine {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite connects");
        migrations::up(&pool, None).await.expect("migrations apply");
        StorageEngine::from_pool(pool)
    }

    #[tokio::test]
    async fn health_check_reports_responsive() {
        let engine = open_memory().await;
        let health = engine.health_check().await;
        assert!(health.connected);
        assert!(health.responsive);
    }
}
