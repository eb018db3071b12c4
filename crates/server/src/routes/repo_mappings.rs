//! Repository-to-board routing rules: which board a task-creating client
//! (an editor plugin, a git hook) should target given the repo it's
//! looking at. Highest `priority` wins on a tie between matching patterns.

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

use kanban_core_db::models::{CreateRepoMapping, RepoMapping};
use kanban_core_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/repo-mappings", get(list_mappings).post(create_mapping))
        .route("/repo-mappings/{id}", axum::routing::delete(delete_mapping))
}

async fn list_mappings(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<RepoMapping>>>, ApiError> {
    let mappings = RepoMapping::list(state.storage.pool())
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(mappings)))
}

async fn create_mapping(
    State(state): State<AppState>,
    Json(data): Json<CreateRepoMapping>,
) -> Result<Json<ApiResponse<RepoMapping>>, ApiError> {
    let mapping = RepoMapping::create(state.storage.pool(), &data, Uuid::new_v4())
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(mapping)))
}

async fn delete_mapping(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    RepoMapping::delete(state.storage.pool(), id)
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(serde_json::json!({ "deleted": id }))))
}
