//! `CreateSubtask` orchestration: depth and cross-board checks that need
//! the parent loaded first, layered on top of
//! `kanban_core_db::models::Task::create_subtask`, followed by a rollup
//! recompute so the new leaf's parent chain reflects it immediately.

use kanban_core_db::models::{CreateTask, Task};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::EngineError;
use crate::rollup;

/// Root tasks sit at depth 0; a parent at depth `MAX_DEPTH` or deeper may
/// not take on another subtask.
pub const MAX_DEPTH: u32 = 3;

pub async fn create_subtask(
    conn: &mut SqliteConnection,
    parent_id: Uuid,
    column_id: Uuid,
    data: &CreateTask,
    id: Uuid,
) -> Result<Task, EngineError> {
    let parent = Task::find_by_id(&mut *conn, parent_id)
        .await?
        .ok_or(EngineError::NotFound(parent_id))?;

    if parent.board_id != data.board_id {
        return Err(EngineError::CrossBoard);
    }

    let parent_depth = Task::depth_of(&mut *conn, parent_id).await?;
    if parent_depth >= MAX_DEPTH {
        return Err(EngineError::DepthExceeded);
    }

    let task = Task::create_subtask(conn, &parent, column_id, data, id).await?;
    rollup::recompute_from(conn, task.id).await?;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanban_core_db::models::{Board, Column, CreateBoard, CreateColumn};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (sqlx::SqlitePool, Uuid, Uuid) {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite connects");
        kanban_core_db::migrations::up(&pool, None)
            .await
            .expect("migrations apply");
        let mut conn = pool.acquire().await.expect("conn");
        let board = Board::create(
            &mut *conn,
            &CreateBoard { name: "Board".to_string(), description: None },
            Uuid::new_v4(),
        )
        .await
        .expect("board created");
        let column = Column::create(
            &mut conn,
            &CreateColumn { board_id: board.id, name: "Todo".to_string(), color: None },
            Uuid::new_v4(),
        )
        .await
        .expect("column created");
        (pool, board.id, column.id)
    }

    fn new_task(board_id: Uuid, column_id: Uuid, title: &str) -> CreateTask {
        CreateTask {
            board_id,
            column_id,
            title: title.to_string(),
            description: None,
            priority_int: None,
            due_date: None,
            assignee: None,
            estimated_hours: None,
        }
    }

    #[tokio::test]
    async fn nesting_past_max_depth_is_rejected() {
        let (pool, board_id, column_id) = setup().await;
        let mut conn = pool.acquire().await.expect("conn");

        let mut current = Task::create(&mut conn, &new_task(board_id, column_id, "root"), Uuid::new_v4())
            .await
            .expect("root created");
        for depth in 0..MAX_DEPTH {
            current = create_subtask(
                &mut conn,
                current.id,
                column_id,
                &new_task(board_id, column_id, &format!("depth {depth}")),
                Uuid::new_v4(),
            )
            .await
            .expect("subtask created within depth limit");
        }

        let result = create_subtask(
            &mut conn,
            current.id,
            column_id,
            &new_task(board_id, column_id, "too deep"),
            Uuid::new_v4(),
        )
        .await;
        assert!(matches!(result, Err(EngineError::DepthExceeded)));
    }

    #[tokio::test]
    async fn cross_board_parent_is_rejected() {
        let (pool, board_id, column_id) = setup().await;
        let mut conn = pool.acquire().await.expect("conn");
        let other_board = Board::create(
            &mut *conn,
            &CreateBoard { name: "Other".to_string(), description: None },
            Uuid::new_v4(),
        )
        .await
        .expect("other board created");

        let parent = Task::create(&mut conn, &new_task(board_id, column_id, "parent"), Uuid::new_v4())
            .await
            .expect("parent created");

        let result = create_subtask(
            &mut conn,
            parent.id,
            column_id,
            &new_task(other_board.id, column_id, "mismatched"),
            Uuid::new_v4(),
        )
        .await;
        assert!(matches!(result, Err(EngineError::CrossBoard)));
    }
}
