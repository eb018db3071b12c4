//! Eagerly-maintained progress rollup. A leaf task's `percent_complete` is
//! 100 when `status = done`, else 0; a parent's is the arithmetic mean of
//! its direct children's (already-persisted) percentages. Every status
//! change or structural change (create/move/delete a subtask) walks from
//! the affected task up to the root, recomputing one level at a time —
//! each parent only ever needs its direct children's current values, so
//! there's no need to recurse downward.

use kanban_core_db::models::{Task, TaskStatus};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::EngineError;

/// Fetch the persisted rollup percentage for a task, defaulting to 0 for a
/// task that has no `task_progress` row yet (freshly created).
pub async fn percent_complete(
    conn: &mut SqliteConnection,
    task_id: Uuid,
) -> Result<f64, sqlx::Error> {
    let value: Option<f64> =
        sqlx::query_scalar("SELECT percent_complete FROM task_progress WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(value.unwrap_or(0.0))
}

async fn upsert_percent(
    conn: &mut SqliteConnection,
    task_id: Uuid,
    percent: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO task_progress (task_id, percent_complete, updated_at) \
         VALUES (?, ?, datetime('now', 'subsec')) \
         ON CONFLICT (task_id) DO UPDATE SET percent_complete = excluded.percent_complete, \
         updated_at = excluded.updated_at",
    )
    .bind(task_id)
    .bind(percent)
    .execute(conn)
    .await?;
    Ok(())
}

/// Recomputes `task_id`'s own percentage from its current state (leaf
/// status, or the mean of its children's stored percentages), persists it,
/// then walks up through `parent_task_id` recomputing each ancestor in
/// turn. Call this after any task status change or any subtask
/// create/move/delete.
pub async fn recompute_from(conn: &mut SqliteConnection, task_id: Uuid) -> Result<(), EngineError> {
    let mut current = Some(task_id);
    while let Some(id) = current {
        let task = Task::find_by_id(&mut *conn, id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        let children = Task::list_children(&mut *conn, id).await?;

        let percent = if children.is_empty() {
            if task.status == TaskStatus::Done {
                100.0
            } else {
                0.0
            }
        } else {
            let mut sum = 0.0;
            for child in &children {
                sum += percent_complete(conn, child.id).await?;
            }
            sum / children.len() as f64
        };

        upsert_percent(conn, id, percent).await?;
        current = task.parent_task_id;
    }
    Ok(())
}

/// `UpdateTaskStatus` to `done` must fail `HAS_OPEN_CHILDREN` if any direct
/// child is not itself done or archived.
pub async fn assert_closable(conn: &mut SqliteConnection, task_id: Uuid) -> Result<(), EngineError> {
    let children = Task::list_children(&mut *conn, task_id).await?;
    let has_open_child = children
        .iter()
        .any(|c| !matches!(c.status, TaskStatus::Done | TaskStatus::Archived));
    if has_open_child {
        return Err(EngineError::HasOpenChildren);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanban_core_db::models::{Board, Column, CreateBoard, CreateColumn, CreateTask};
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
    async fn leaf_rollup_is_all_or_nothing() {
        let (pool, board_id, column_id) = setup().await;
        let mut conn = pool.acquire().await.expect("conn");
        let task = Task::create(&mut conn, &new_task(board_id, column_id, "Leaf"), Uuid::new_v4())
            .await
            .expect("task created");

        recompute_from(&mut conn, task.id).await.expect("recompute");
        assert_eq!(percent_complete(&mut conn, task.id).await.unwrap(), 0.0);

        Task::set_status(&mut conn, task.id, TaskStatus::Done)
            .await
            .expect("status set");
        recompute_from(&mut conn, task.id).await.expect("recompute");
        assert_eq!(percent_complete(&mut conn, task.id).await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn parent_rollup_is_mean_of_children() {
        let (pool, board_id, column_id) = setup().await;
        let mut conn = pool.acquire().await.expect("conn");
        let parent = Task::create(&mut conn, &new_task(board_id, column_id, "Parent"), Uuid::new_v4())
            .await
            .expect("parent created");

        let mut children = Vec::new();
        for i in 0..3 {
            let child = Task::create_subtask(
                &mut conn,
                &parent,
                column_id,
                &new_task(board_id, column_id, &format!("Child {i}")),
                Uuid::new_v4(),
            )
            .await
            .expect("child created");
            children.push(child);
        }

        Task::set_status(&mut conn, children[0].id, TaskStatus::Done)
            .await
            .expect("status set");
        recompute_from(&mut conn, children[0].id).await.expect("recompute");
        let percent = percent_complete(&mut conn, parent.id).await.unwrap();
        assert!((percent - 33.333333).abs() < 0.001);

        Task::set_status(&mut conn, children[1].id, TaskStatus::Done)
            .await
            .expect("status set");
        recompute_from(&mut conn, children[1].id).await.expect("recompute");
        let percent = percent_complete(&mut conn, parent.id).await.unwrap();
        assert!((percent - 66.666666).abs() < 0.001);

        Task::set_status(&mut conn, children[2].id, TaskStatus::Done)
            .await
            .expect("status set");
        recompute_from(&mut conn, children[2].id).await.expect("recompute");
        let percent = percent_complete(&mut conn, parent.id).await.unwrap();
        assert!((percent - 100.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn closing_parent_with_open_child_is_rejected() {
        let (pool, board_id, column_id) = setup().await;
        let mut conn = pool.acquire().await.expect("conn");
        let parent = Task::create(&mut conn, &new_task(board_id, column_id, "Parent"), Uuid::new_v4())
            .await
            .expect("parent created");
        Task::create_subtask(
            &mut conn,
            &parent,
            column_id,
            &new_task(board_id, column_id, "Child"),
            Uuid::new_v4(),
        )
        .await
        .expect("child created");

        let result = assert_closable(&mut conn, parent.id).await;
        assert!(matches!(result, Err(EngineError::HasOpenChildren)));
    }
}
