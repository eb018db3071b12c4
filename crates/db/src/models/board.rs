use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("board not found")]
    NotFound,
    #[error("a board named '{0}' already exists")]
    DuplicateName(String),
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateBoard {
    pub name: String,
    pub description: Option<String>,
}

impl Board {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Board>("SELECT id, name, description, created_at, archived FROM boards WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list<'e, E>(executor: E, include_archived: bool) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let sql = if include_archived {
            "SELECT id, name, description, created_at, archived FROM boards ORDER BY created_at"
        } else {
            "SELECT id, name, description, created_at, archived FROM boards WHERE archived = 0 ORDER BY created_at"
        };
        sqlx::query_as::<_, Board>(sql).fetch_all(executor).await
    }

    pub async fn create<'e, E>(executor: E, data: &CreateBoard, id: Uuid) -> Result<Self, BoardError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Board>(
            "INSERT INTO boards (id, name, description) VALUES (?, ?, ?) \
             RETURNING id, name, description, created_at, archived",
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .fetch_one(executor)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                BoardError::DuplicateName(data.name.clone())
            }
            _ => BoardError::Database(e),
        })
    }

    pub async fn archive<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query("UPDATE boards SET archived = 1 WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
