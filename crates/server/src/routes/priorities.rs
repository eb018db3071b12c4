//! `/api/priorities/next` (recommendation) and `/api/priorities/calculate`
//! (board-wide recompute).

use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kanban_core_db::models::Task;
use kanban_core_engine::next_task::NextTaskFilter;
use kanban_core_engine::priority::FactorContribution;
use kanban_core_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/priorities/next", get(next_task))
        .route("/priorities/calculate", post(calculate))
}

#[derive(Debug, Deserialize)]
pub struct NextTaskQuery {
    pub board: Uuid,
    pub assignee: Option<String>,
    pub time_available: Option<i64>,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    #[serde(default = "default_true")]
    pub exclude_blocked: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct FactorView {
    pub factor: &'static str,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

impl From<FactorContribution> for FactorView {
    fn from(value: FactorContribution) -> Self {
        Self { factor: value.factor, value: value.value, weight: value.weight, contribution: value.contribution }
    }
}

#[derive(Debug, Serialize)]
pub struct NextTaskResponse {
    pub task: Task,
    pub reasoning: Vec<FactorView>,
    pub unblocks: Vec<Uuid>,
}

async fn next_task(
    State(state): State<AppState>,
    Query(query): Query<NextTaskQuery>,
) -> Result<Json<ApiResponse<Option<NextTaskResponse>>>, ApiError> {
    let filter = NextTaskFilter {
        board_id: Some(query.board),
        assignee: query.assignee,
        skill_tags: query.skill_tags,
        time_available_minutes: query.time_available,
        exclude_blocked: query.exclude_blocked,
    };
    let result = state.tasks.get_next_task(&filter).await?.map(|r| NextTaskResponse {
        task: r.task,
        reasoning: r.reasoning.into_iter().map(FactorView::from).collect(),
        unblocks: r.unblocks,
    });
    Ok(Json(ApiResponse::success(result)))
}

#[derive(Debug, Deserialize)]
pub struct CalculateBody {
    pub board: Uuid,
}

async fn calculate(
    State(state): State<AppState>,
    Json(body): Json<CalculateBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let count = state.tasks.recompute_priorities(body.board).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({ "recomputed": count }))))
}
