//! Assembles the `/api` route table: resource routers merged together,
//! then layered with rate limiting and API-key auth. `/api/database/health`
//! is deliberately exempt from auth — it is what an operator polls before
//! a credential is even configured.

pub mod backup;
pub mod boards;
pub mod context;
pub mod health;
pub mod priorities;
pub mod repo_mappings;
pub mod tasks;

use axum::routing::get;
use axum::Router;

use crate::middleware;
use crate::state::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    let authenticated = boards::router()
        .merge(tasks::router())
        .merge(priorities::router())
        .merge(context::router())
        .merge(backup::router())
        .merge(repo_mappings::router())
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::require_api_key));

    let api = Router::new()
        .merge(authenticated)
        .route("/database/health", get(health::database_health))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::enforce_rate_limit));

    Router::new().nest("/api", api)
}
