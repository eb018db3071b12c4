//! `/api/tasks` CRUD, filtered listing, dependency edges, and subtask
//! management — the representative route table's largest resource.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use kanban_core_db::models::{CreateNote, CreateTask, Dependency, DependencyType, Note, Task, TaskFilters, TaskStatus, UpdateTask};
use kanban_core_utils::pagination::{PaginationMeta, PaginationParams};
use kanban_core_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task).patch(update_task).delete(delete_task))
        .route("/tasks/{id}/status", post(update_status))
        .route("/tasks/{id}/move", post(move_task))
        .route(
            "/tasks/{id}/dependencies",
            get(list_dependencies).post(add_dependency),
        )
        .route("/tasks/{id}/dependencies/{dep_id}", axum::routing::delete(remove_dependency))
        .route("/tasks/{id}/subtasks", get(list_subtasks).post(create_subtask))
        .route("/tasks/{id}/notes", get(list_notes).post(add_note))
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub board: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub priority_min: Option<i64>,
    pub priority_max: Option<i64>,
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Order,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Desc,
    Asc,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ApiError> {
    let filters = TaskFilters {
        board_id: query.board,
        status: query.status,
        assignee: query.assignee,
        priority_min: query.priority_min,
        priority_max: query.priority_max,
        search: query.search,
    };
    let pagination = PaginationParams { limit: query.limit, offset: query.offset };
    let sort_column = query.sort.as_deref().unwrap_or("created_at");
    let descending = matches!(query.order, Order::Desc);

    let mut conn = state
        .storage
        .pool()
        .acquire()
        .await
        .map_err(kanban_core_services::ServiceError::from)?;

    if let Some(tag) = query.tag {
        let (tasks, total) = Task::search_by_tag(
            &mut conn,
            &filters,
            &tag,
            sort_column,
            descending,
            pagination.limit(),
            pagination.offset(),
        )
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
        return Ok(Json(ApiResponse::success_paginated(tasks, PaginationMeta::new(pagination, total))));
    }

    let (tasks, total) = Task::search(
        &mut conn,
        &filters,
        sort_column,
        descending,
        pagination.limit(),
        pagination.offset(),
    )
    .await
    .map_err(kanban_core_services::ServiceError::from)?;

    Ok(Json(ApiResponse::success_paginated(tasks, PaginationMeta::new(pagination, total))))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = Task::find_by_id(state.storage.pool(), id)
        .await
        .map_err(kanban_core_services::ServiceError::from)?
        .ok_or(kanban_core_services::ServiceError::TaskNotFound(id))?;
    Ok(Json(ApiResponse::success(task)))
}

async fn create_task(
    State(state): State<AppState>,
    Json(data): Json<CreateTask>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = state.tasks.create_task(&data).await?;
    Ok(Json(ApiResponse::success(task)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateTask>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = state.tasks.update_task(id, &data).await?;
    Ok(Json(ApiResponse::success(task)))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.tasks.delete_task(id).await?;
    Ok(Json(ApiResponse::success(())))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: TaskStatus,
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = state.tasks.update_task_status(id, body.status).await?;
    Ok(Json(ApiResponse::success(task)))
}

#[derive(Debug, Deserialize)]
pub struct MoveTaskBody {
    pub column_id: Uuid,
    pub position: i64,
}

async fn move_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MoveTaskBody>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = state.tasks.move_task(id, body.column_id, body.position).await?;
    Ok(Json(ApiResponse::success(task)))
}

async fn list_dependencies(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Dependency>>>, ApiError> {
    let dependencies = Dependency::list_for_task(state.storage.pool(), id)
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(dependencies)))
}

#[derive(Debug, Deserialize)]
pub struct AddDependencyBody {
    pub depends_on_task_id: Uuid,
    #[serde(default = "default_dependency_type")]
    pub dependency_type: DependencyType,
}

fn default_dependency_type() -> DependencyType {
    DependencyType::Blocks
}

async fn add_dependency(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AddDependencyBody>,
) -> Result<Json<ApiResponse<Dependency>>, ApiError> {
    let dependency = state
        .tasks
        .add_dependency(id, body.depends_on_task_id, body.dependency_type)
        .await?;
    Ok(Json(ApiResponse::success(dependency)))
}

async fn remove_dependency(
    State(state): State<AppState>,
    Path((id, dep_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.tasks.remove_dependency(id, dep_id).await?;
    Ok(Json(ApiResponse::success(())))
}

async fn list_subtasks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ApiError> {
    let subtasks = Task::list_children(state.storage.pool(), id)
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(subtasks)))
}

#[derive(Debug, Deserialize)]
pub struct CreateSubtaskBody {
    pub column_id: Uuid,
    #[serde(flatten)]
    pub data: CreateTask,
}

async fn create_subtask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateSubtaskBody>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = state.tasks.create_subtask(id, body.column_id, &body.data).await?;
    Ok(Json(ApiResponse::success(task)))
}

async fn list_notes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Note>>>, ApiError> {
    let notes = Note::list_for_task(state.storage.pool(), id)
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(notes)))
}

async fn add_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut data): Json<CreateNote>,
) -> Result<Json<ApiResponse<Note>>, ApiError> {
    data.task_id = id;
    let note = state.tasks.add_note(&data).await?;
    Ok(Json(ApiResponse::success(note)))
}
