use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Column {
    pub id: Uuid,
    pub board_id: Uuid,
    pub name: String,
    pub position: i64,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateColumn {
    pub board_id: Uuid,
    pub name: String,
    pub color: Option<String>,
}

impl Column {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Column>("SELECT id, board_id, name, position, color FROM columns WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list_for_board<'e, E>(executor: E, board_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Column>(
            "SELECT id, board_id, name, position, color FROM columns WHERE board_id = ? ORDER BY position",
        )
        .bind(board_id)
        .fetch_all(executor)
        .await
    }

    /// Dense append: `position` = `max(position) + 1` within the board.
    /// Takes an explicit connection (rather than a generic executor) since
    /// it issues two statements that must observe each other's effects.
    pub async fn create(conn: &mut SqliteConnection, data: &CreateColumn, id: Uuid) -> Result<Self, sqlx::Error> {
        let next_position: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(position) + 1, 0) FROM columns WHERE board_id = ?")
                .bind(data.board_id)
                .fetch_one(&mut *conn)
                .await?;

        sqlx::query_as::<_, Column>(
            "INSERT INTO columns (id, board_id, name, position, color) VALUES (?, ?, ?, ?, ?) \
             RETURNING id, board_id, name, position, color",
        )
        .bind(id)
        .bind(data.board_id)
        .bind(&data.name)
        .bind(next_position)
        .bind(&data.color)
        .fetch_one(conn)
        .await
    }
}
