//! `/api/backup[/{name}]`: trigger, list, and delete backups.

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use kanban_core_db::models::BackupMetadata;
use kanban_core_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/backup", post(create_backup).get(list_backups))
        .route("/backup/{name}", get(get_backup).delete(delete_backup))
}

#[derive(Debug, Deserialize)]
pub struct CreateBackupBody {
    pub name: String,
    #[serde(default)]
    pub incremental: bool,
}

async fn create_backup(
    State(state): State<AppState>,
    Json(body): Json<CreateBackupBody>,
) -> Result<Json<ApiResponse<BackupMetadata>>, ApiError> {
    let metadata = if body.incremental {
        state.backups.run_incremental_backup(&body.name).await?
    } else {
        state.backups.run_full_backup(&body.name).await?
    };
    Ok(Json(ApiResponse::success(metadata)))
}

async fn list_backups(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<BackupMetadata>>>, ApiError> {
    let backups = BackupMetadata::list(state.storage.pool())
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(backups)))
}

async fn get_backup(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<BackupMetadata>>, ApiError> {
    let backups = BackupMetadata::list(state.storage.pool())
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    let found = backups
        .into_iter()
        .find(|b| b.name == name)
        .ok_or_else(|| ApiError::BadRequest(format!("no backup named '{name}'")))?;
    Ok(Json(ApiResponse::success(found)))
}

async fn delete_backup(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let backups = BackupMetadata::list(state.storage.pool())
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    let found = backups
        .into_iter()
        .find(|b| b.name == name)
        .ok_or_else(|| ApiError::BadRequest(format!("no backup named '{name}'")))?;
    let _ = tokio::fs::remove_file(&found.file_path).await;
    let _ = tokio::fs::remove_file(format!("{}.meta.json", found.file_path)).await;
    BackupMetadata::delete(state.storage.pool(), found.id)
        .await
        .map_err(kanban_core_services::ServiceError::from)?;
    Ok(Json(ApiResponse::success(())))
}
