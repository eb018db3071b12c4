pub mod error;
pub mod mcp;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

/// The full HTTP/WebSocket surface: `/api/**` behind auth and rate
/// limiting, plus the unauthenticated-until-its-first-message `/ws`
/// upgrade endpoint.
pub fn app(state: AppState) -> Router {
    routes::router(&state)
        .route("/ws", get(ws::upgrade))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
