use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum NoteCategory {
    General,
    Implementation,
    Research,
    Blocker,
    Idea,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Note {
    pub id: Uuid,
    pub task_id: Uuid,
    pub board_id: Uuid,
    pub content: String,
    pub category: NoteCategory,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNote {
    pub task_id: Uuid,
    pub board_id: Uuid,
    pub content: String,
    pub category: NoteCategory,
}

const SELECT_NOTE_COLUMNS: &str =
    "id, task_id, board_id, content, category, pinned, created_at, updated_at";

impl Note {
    pub async fn list_for_task<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Note>(&format!(
            "SELECT {SELECT_NOTE_COLUMNS} FROM notes WHERE task_id = ? ORDER BY created_at"
        ))
        .bind(task_id)
        .fetch_all(executor)
        .await
    }

    pub async fn create<'e, E>(executor: E, data: &CreateNote, id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Note>(&format!(
            "INSERT INTO notes (id, task_id, board_id, content, category) VALUES (?, ?, ?, ?, ?) \
             RETURNING {SELECT_NOTE_COLUMNS}"
        ))
        .bind(id)
        .bind(data.task_id)
        .bind(data.board_id)
        .bind(&data.content)
        .bind(data.category)
        .fetch_one(executor)
        .await
    }

    pub async fn set_pinned<'e, E>(executor: E, id: Uuid, pinned: bool) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Note>(&format!(
            "UPDATE notes SET pinned = ?, updated_at = datetime('now', 'subsec') WHERE id = ? \
             RETURNING {SELECT_NOTE_COLUMNS}"
        ))
        .bind(pinned)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Full-text search over note content via the `notes_fts` shadow table,
    /// scoped to a single board.
    pub async fn search<'e, E>(
        executor: E,
        board_id: Uuid,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Note>(&format!(
            "SELECT n.id, n.task_id, n.board_id, n.content, n.category, n.pinned, \
             n.created_at, n.updated_at \
             FROM notes_fts f \
             JOIN notes n ON n.rowid = f.rowid \
             WHERE f.content MATCH ? AND n.board_id = ? \
             ORDER BY rank LIMIT ?",
        ))
        .bind(query)
        .bind(board_id)
        .bind(limit as i64)
        .fetch_all(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
