//! `/api/context[/task/{id}|/summary]`: read-oriented payloads meant for an
//! agent picking up work — a task's full surrounding context, or a
//! board-wide digest.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kanban_core_db::models::{Dependency, Note, Tag, Task, TaskStatus};
use kanban_core_engine::rollup;
use kanban_core_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/context", get(summary))
        .route("/context/summary", get(summary))
        .route("/context/task/{id}", get(task_context))
}

#[derive(Debug, Serialize)]
pub struct TaskContext {
    pub task: Task,
    pub percent_complete: f64,
    pub notes: Vec<Note>,
    pub tags: Vec<Tag>,
    pub dependencies: Vec<Dependency>,
    pub subtasks: Vec<Task>,
}

async fn task_context(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TaskContext>>, ApiError> {
    let pool = state.storage.pool();
    let task = Task::find_by_id(pool, id)
        .await
        .map_err(kanban_core_services::ServiceError::from)?
        .ok_or(kanban_core_services::ServiceError::TaskNotFound(id))?;

    let mut conn = state.storage.pool().acquire().await.map_err(kanban_core_services::ServiceError::from)?;
    let percent_complete = rollup::percent_complete(&mut conn, id)
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    drop(conn);

    let notes = Note::list_for_task(pool, id).await.map_err(kanban_core_services::ServiceError::from)?;
    let tags = Tag::list_for_task(pool, id).await.map_err(kanban_core_services::ServiceError::from)?;
    let dependencies = Dependency::list_for_task(pool, id).await.map_err(kanban_core_services::ServiceError::from)?;
    let subtasks = Task::list_children(pool, id).await.map_err(kanban_core_services::ServiceError::from)?;

    Ok(Json(ApiResponse::success(TaskContext { task, percent_complete, notes, tags, dependencies, subtasks })))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub board: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BoardSummary {
    pub board_id: Uuid,
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    pub blocked: usize,
    pub archived: usize,
    pub overdue: usize,
}

async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ApiResponse<BoardSummary>>, ApiError> {
    let pool = state.storage.pool();
    let tasks = Task::all_on_board(pool, query.board).await.map_err(kanban_core_services::ServiceError::from)?;
    let overdue = Task::list_overdue(pool, query.board).await.map_err(kanban_core_services::ServiceError::from)?;

    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
    let summary = BoardSummary {
        board_id: query.board,
        total: tasks.len(),
        todo: count(TaskStatus::Todo),
        in_progress: count(TaskStatus::InProgress),
        done: count(TaskStatus::Done),
        blocked: count(TaskStatus::Blocked),
        archived: count(TaskStatus::Archived),
        overdue: overdue.len(),
    };
    Ok(Json(ApiResponse::success(summary)))
}
