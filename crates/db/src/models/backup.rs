use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BackupType {
    Full,
    Incremental,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BackupStatus {
    Pending,
    Verified,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BackupMetadata {
    pub id: Uuid,
    pub name: String,
    #[sqlx(rename = "type")]
    pub backup_type: BackupType,
    pub created_at: DateTime<Utc>,
    pub size_bytes: i64,
    pub checksum: String,
    pub status: BackupStatus,
    pub retention_days: i64,
    pub file_path: String,
}

const SELECT_BACKUP_COLUMNS: &str =
    "id, name, type, created_at, size_bytes, checksum, status, retention_days, file_path";

impl BackupMetadata {
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, BackupMetadata>(&format!(
            "SELECT {SELECT_BACKUP_COLUMNS} FROM backups ORDER BY created_at DESC"
        ))
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, BackupMetadata>(&format!(
            "SELECT {SELECT_BACKUP_COLUMNS} FROM backups WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        name: &str,
        backup_type: BackupType,
        size_bytes: i64,
        checksum: &str,
        retention_days: i64,
        file_path: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, BackupMetadata>(&format!(
            "INSERT INTO backups (id, name, type, size_bytes, checksum, status, retention_days, file_path) \
             VALUES (?, ?, ?, ?, ?, 'pending', ?, ?) RETURNING {SELECT_BACKUP_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(backup_type)
        .bind(size_bytes)
        .bind(checksum)
        .bind(retention_days)
        .bind(file_path)
        .fetch_one(executor)
        .await
    }

    pub async fn mark_status<'e, E>(executor: E, id: Uuid, status: BackupStatus) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query("UPDATE backups SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Backups whose retention window has elapsed, for the scheduler's
    /// retention sweep.
    pub async fn list_expired<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, BackupMetadata>(&format!(
            "SELECT {SELECT_BACKUP_COLUMNS} FROM backups \
             WHERE datetime(created_at, '+' || retention_days || ' days') < datetime('now')"
        ))
        .fetch_all(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result = sqlx::query("DELETE FROM backups WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
