use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, SqliteConnection};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("task not found")]
    NotFound,
    #[error("column {column_id} does not belong to board {board_id}")]
    ColumnMismatch { column_id: Uuid, board_id: Uuid },
    #[error("parent task is on a different board")]
    CrossBoard,
    #[error("subtask nesting depth exceeded")]
    DepthExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Blocked,
    Archived,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Archived => "archived",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub board_id: Uuid,
    pub column_id: Uuid,
    pub parent_task_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority_int: i64,
    pub priority_score: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee: Option<String>,
    pub estimated_hours: Option<f64>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateTask {
    pub board_id: Uuid,
    pub column_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority_int: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee: Option<String>,
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority_int: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee: Option<String>,
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskFilters {
    pub board_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub priority_min: Option<i64>,
    pub priority_max: Option<i64>,
    pub search: Option<String>,
}

const SELECT_TASK_COLUMNS: &str = "id, board_id, column_id, parent_task_id, title, description, \
    status, priority_int, priority_score, due_date, assignee, estimated_hours, position, \
    created_at, updated_at, archived";

impl Task {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!("SELECT {SELECT_TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list_children<'e, E>(executor: E, parent_task_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {SELECT_TASK_COLUMNS} FROM tasks WHERE parent_task_id = ? ORDER BY position"
        ))
        .bind(parent_task_id)
        .fetch_all(executor)
        .await
    }

    /// Depth of `task_id` in its parent chain: 0 for a root task.
    pub async fn depth_of<'e, E>(executor: E, task_id: Uuid) -> Result<u32, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite> + Copy,
    {
        let mut depth = 0;
        let mut current = task_id;
        loop {
            let parent: Option<Uuid> =
                sqlx::query_scalar("SELECT parent_task_id FROM tasks WHERE id = ?")
                    .bind(current)
                    .fetch_optional(executor)
                    .await?
                    .flatten();
            match parent {
                Some(p) => {
                    depth += 1;
                    current = p;
                }
                None => break,
            }
        }
        Ok(depth)
    }

    /// Search with board/status/assignee/priority-range/full-text filters,
    /// validated column names per `kanban-core-db::query::Filterable`, plus
    /// pagination. `sort_column` defaults to `created_at`.
    #[allow(clippy::too_many_arguments)]
    pub async fn search(
        conn: &mut SqliteConnection,
        filters: &TaskFilters,
        sort_column: &str,
        descending: bool,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Self>, u64), sqlx::Error> {
        use crate::query::Filterable;

        struct TaskColumns;
        impl Filterable for TaskColumns {
            const ALLOWED_COLUMNS: &'static [&'static str] = &[
                "id", "board_id", "column_id", "parent_task_id", "title", "status",
                "priority_int", "priority_score", "due_date", "assignee", "position",
                "created_at", "updated_at",
            ];
        }

        let order_by = crate::query::order_by_clause::<TaskColumns>(sort_column, descending)
            .map(|clause| format!("ORDER BY {clause}"))
            .unwrap_or_else(|_| "ORDER BY created_at DESC".to_string());

        let mut where_clauses: Vec<String> = vec!["1 = 1".to_string()];
        if filters.board_id.is_some() {
            where_clauses.push("board_id = ?".to_string());
        }
        if filters.status.is_some() {
            where_clauses.push("status = ?".to_string());
        }
        if filters.assignee.is_some() {
            where_clauses.push("assignee = ?".to_string());
        }
        if filters.priority_min.is_some() {
            where_clauses.push("priority_int >= ?".to_string());
        }
        if filters.priority_max.is_some() {
            where_clauses.push("priority_int <= ?".to_string());
        }
        if filters.search.is_some() {
            where_clauses.push("(title LIKE ? OR description LIKE ?)".to_string());
        }
        let where_sql = where_clauses.join(" AND ");

        macro_rules! bind_all {
            ($query:expr) => {{
                let mut q = $query;
                if let Some(b) = filters.board_id {
                    q = q.bind(b);
                }
                if let Some(s) = filters.status {
                    q = q.bind(s.to_string());
                }
                if let Some(a) = &filters.assignee {
                    q = q.bind(a.clone());
                }
                if let Some(p) = filters.priority_min {
                    q = q.bind(p);
                }
                if let Some(p) = filters.priority_max {
                    q = q.bind(p);
                }
                if let Some(search) = &filters.search {
                    let pattern = format!("%{search}%");
                    q = q.bind(pattern.clone());
                    q = q.bind(pattern);
                }
                q
            }};
        }

        let count_sql = format!("SELECT COUNT(*) FROM tasks WHERE {where_sql}");
        let total: i64 = bind_all!(sqlx::query_scalar(&count_sql))
            .fetch_one(&mut *conn)
            .await?;

        let list_sql =
            format!("SELECT {SELECT_TASK_COLUMNS} FROM tasks WHERE {where_sql} {order_by} LIMIT ? OFFSET ?");
        let rows = bind_all!(sqlx::query_as::<_, Task>(&list_sql))
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(conn)
            .await?;

        Ok((rows, total.max(0) as u64))
    }

    /// Same filter set as [`Task::search`], narrowed to tasks carrying a
    /// tag whose slug or name matches `tag` exactly.
    #[allow(clippy::too_many_arguments)]
    pub async fn search_by_tag(
        conn: &mut SqliteConnection,
        filters: &TaskFilters,
        tag: &str,
        sort_column: &str,
        descending: bool,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Self>, u64), sqlx::Error> {
        use crate::query::Filterable;

        struct TaskColumns;
        impl Filterable for TaskColumns {
            const ALLOWED_COLUMNS: &'static [&'static str] = &[
                "id", "board_id", "column_id", "parent_task_id", "title", "status",
                "priority_int", "priority_score", "due_date", "assignee", "position",
                "created_at", "updated_at",
            ];
        }

        let order_by = crate::query::order_by_clause::<TaskColumns>(sort_column, descending)
            .map(|clause| format!("ORDER BY {clause}"))
            .unwrap_or_else(|_| "ORDER BY created_at DESC".to_string());

        let mut where_clauses: Vec<String> = vec![
            "EXISTS (SELECT 1 FROM task_tags tt JOIN tags tg ON tg.id = tt.tag_id \
              WHERE tt.task_id = tasks.id AND (tg.slug = ? OR tg.name = ?))"
                .to_string(),
        ];
        if filters.board_id.is_some() {
            where_clauses.push("board_id = ?".to_string());
        }
        if filters.status.is_some() {
            where_clauses.push("status = ?".to_string());
        }
        if filters.assignee.is_some() {
            where_clauses.push("assignee = ?".to_string());
        }
        if filters.priority_min.is_some() {
            where_clauses.push("priority_int >= ?".to_string());
        }
        if filters.priority_max.is_some() {
            where_clauses.push("priority_int <= ?".to_string());
        }
        if filters.search.is_some() {
            where_clauses.push("(title LIKE ? OR description LIKE ?)".to_string());
        }
        let where_sql = where_clauses.join(" AND ");

        macro_rules! bind_all {
            ($query:expr) => {{
                let mut q = $query;
                q = q.bind(tag).bind(tag);
                if let Some(b) = filters.board_id {
                    q = q.bind(b);
                }
                if let Some(s) = filters.status {
                    q = q.bind(s.to_string());
                }
                if let Some(a) = &filters.assignee {
                    q = q.bind(a.clone());
                }
                if let Some(p) = filters.priority_min {
                    q = q.bind(p);
                }
                if let Some(p) = filters.priority_max {
                    q = q.bind(p);
                }
                if let Some(search) = &filters.search {
                    let pattern = format!("%{search}%");
                    q = q.bind(pattern.clone());
                    q = q.bind(pattern);
                }
                q
            }};
        }

        let count_sql = format!("SELECT COUNT(*) FROM tasks WHERE {where_sql}");
        let total: i64 = bind_all!(sqlx::query_scalar(&count_sql))
            .fetch_one(&mut *conn)
            .await?;

        let list_sql =
            format!("SELECT {SELECT_TASK_COLUMNS} FROM tasks WHERE {where_sql} {order_by} LIMIT ? OFFSET ?");
        let rows = bind_all!(sqlx::query_as::<_, Task>(&list_sql))
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(conn)
            .await?;

        Ok((rows, total.max(0) as u64))
    }

    /// `CreateSubtask`/`CreateTask`: dense tail position within the column.
    pub async fn create(conn: &mut SqliteConnection, data: &CreateTask, id: Uuid) -> Result<Self, sqlx::Error> {
        let next_position: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE column_id = ?")
                .bind(data.column_id)
                .fetch_one(&mut *conn)
                .await?;

        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (id, board_id, column_id, title, description, priority_int, due_date, \
             assignee, estimated_hours, position) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {SELECT_TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(data.board_id)
        .bind(data.column_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.priority_int.unwrap_or(4))
        .bind(data.due_date)
        .bind(&data.assignee)
        .bind(data.estimated_hours)
        .bind(next_position)
        .fetch_one(conn)
        .await
    }

    /// `CreateSubtask`: inherits `board_id`, appends within the sibling
    /// set. Depth/cross-board checks are the caller's (service layer's)
    /// responsibility since they require reading the parent first.
    pub async fn create_subtask(
        conn: &mut SqliteConnection,
        parent: &Task,
        column_id: Uuid,
        data: &CreateTask,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let next_position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE parent_task_id = ?",
        )
        .bind(parent.id)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (id, board_id, column_id, parent_task_id, title, description, \
             priority_int, due_date, assignee, estimated_hours, position) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {SELECT_TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(parent.board_id)
        .bind(column_id)
        .bind(parent.id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.priority_int.unwrap_or(4))
        .bind(data.due_date)
        .bind(&data.assignee)
        .bind(data.estimated_hours)
        .bind(next_position)
        .fetch_one(conn)
        .await
    }

    pub async fn update_fields(
        conn: &mut SqliteConnection,
        id: Uuid,
        data: &UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let existing = Self::find_by_id(&mut *conn, id).await?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let title = data.title.clone().unwrap_or(existing.title);
        let description = data.description.clone().or(existing.description);
        let priority_int = data.priority_int.unwrap_or(existing.priority_int);
        let due_date = data.due_date.or(existing.due_date);
        let assignee = data.assignee.clone().or(existing.assignee);
        let estimated_hours = data.estimated_hours.or(existing.estimated_hours);

        sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET title = ?, description = ?, priority_int = ?, due_date = ?, \
             assignee = ?, estimated_hours = ?, updated_at = datetime('now', 'subsec') \
             WHERE id = ? RETURNING {SELECT_TASK_COLUMNS}"
        ))
        .bind(title)
        .bind(description)
        .bind(priority_int)
        .bind(due_date)
        .bind(assignee)
        .bind(estimated_hours)
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn set_status(
        conn: &mut SqliteConnection,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET status = ?, updated_at = datetime('now', 'subsec') WHERE id = ? \
             RETURNING {SELECT_TASK_COLUMNS}"
        ))
        .bind(status.to_string())
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn set_priority_score(
        conn: &mut SqliteConnection,
        id: Uuid,
        score: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET priority_score = ? WHERE id = ?")
            .bind(score)
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// `MoveTask`: reassigns column and re-packs both the old and new
    /// column's positions densely.
    pub async fn move_to_column(
        conn: &mut SqliteConnection,
        id: Uuid,
        new_column_id: Uuid,
        new_position: i64,
    ) -> Result<(), sqlx::Error> {
        let old_column_id: Option<Uuid> = sqlx::query_scalar("SELECT column_id FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        sqlx::query("UPDATE tasks SET column_id = ?, position = ?, updated_at = datetime('now', 'subsec') WHERE id = ?")
            .bind(new_column_id)
            .bind(new_position)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if let Some(old_column_id) = old_column_id {
            if old_column_id != new_column_id {
                repack_positions(conn, "column_id", old_column_id).await?;
            }
        }
        repack_positions(conn, "column_id", new_column_id).await
    }

    pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn all_on_board<'e, E>(executor: E, board_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {SELECT_TASK_COLUMNS} FROM tasks WHERE board_id = ?"
        ))
        .bind(board_id)
        .fetch_all(executor)
        .await
    }

    pub async fn list_overdue<'e, E>(executor: E, board_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {SELECT_TASK_COLUMNS} FROM tasks WHERE board_id = ? AND due_date < datetime('now') \
             AND status NOT IN ('done', 'archived')"
        ))
        .bind(board_id)
        .fetch_all(executor)
        .await
    }

    pub async fn count_row<'e, E>(executor: E, sql: &str, board_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let row = sqlx::query(sql).bind(board_id).fetch_one(executor).await?;
        row.try_get(0)
    }
}

async fn repack_positions(
    conn: &mut SqliteConnection,
    scope_column: &str,
    scope_value: Uuid,
) -> Result<(), sqlx::Error> {
    let sql = format!(
        "SELECT id FROM tasks WHERE {scope_column} = ? ORDER BY position, created_at"
    );
    let ids: Vec<Uuid> = sqlx::query_scalar(&sql)
        .bind(scope_value)
        .fetch_all(&mut *conn)
        .await?;
    for (index, task_id) in ids.into_iter().enumerate() {
        sqlx::query("UPDATE tasks SET position = ? WHERE id = ?")
            .bind(index as i64)
            .bind(task_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
