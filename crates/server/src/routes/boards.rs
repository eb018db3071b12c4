//! Minimal board and column management. Not part of the representative
//! route table but required ambient scaffolding: a task cannot exist
//! without a board and a column to belong to.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use kanban_core_db::models::{Board, Column, CreateBoard, CreateColumn};
use kanban_core_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/boards", post(create_board).get(list_boards))
        .route("/boards/{id}/columns", post(create_column).get(list_columns))
}

#[derive(Debug, Deserialize)]
pub struct ListBoardsQuery {
    #[serde(default)]
    pub include_archived: bool,
}

async fn list_boards(
    State(state): State<AppState>,
    Query(query): Query<ListBoardsQuery>,
) -> Result<Json<ApiResponse<Vec<Board>>>, ApiError> {
    let boards = Board::list(state.storage.pool(), query.include_archived)
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(boards)))
}

async fn create_board(
    State(state): State<AppState>,
    Json(data): Json<CreateBoard>,
) -> Result<Json<ApiResponse<Board>>, ApiError> {
    let board = Board::create(state.storage.pool(), &data, Uuid::new_v4())
        .await
        .map_err(|e| match e {
            kanban_core_db::models::board::BoardError::DuplicateName(name) => {
                ApiError::BadRequest(format!("a board named '{name}' already exists"))
            }
            kanban_core_db::models::board::BoardError::NotFound => {
                ApiError::Service(kanban_core_services::ServiceError::BoardNotFound(Uuid::nil()))
            }
            kanban_core_db::models::board::BoardError::Database(e) => {
                ApiError::Service(e.into())
            }
        })?;
    Ok(Json(ApiResponse::success(board)))
}

async fn list_columns(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Column>>>, ApiError> {
    let columns = Column::list_for_board(state.storage.pool(), board_id)
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(columns)))
}

async fn create_column(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(mut data): Json<CreateColumn>,
) -> Result<Json<ApiResponse<Column>>, ApiError> {
    data.board_id = board_id;
    let mut conn = state
        .storage
        .pool()
        .acquire()
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    let column = Column::create(&mut conn, &data, Uuid::new_v4())
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(column)))
}
