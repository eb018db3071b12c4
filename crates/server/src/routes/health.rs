//! `GET /api/database/health`: connectivity, responsiveness, and row counts.

use axum::extract::State;
use axum::response::Json;

use kanban_core_utils::response::ApiResponse;

use crate::state::AppState;

pub async fn database_health(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let health = state.storage.health_check().await;
    Json(ApiResponse::success(serde_json::json!({
        "connected": health.connected,
        "responsive": health.responsive,
        "restoring": state.backups.is_restoring(),
        "stats": health.stats,
    })))
}
