//! `Authorization: Bearer <key>` or `X-API-Key: <key>`, checked first
//! against the statically configured keys (`API_KEYS`), then against
//! `api_keys` rows created at runtime. Missing or unrecognized credentials
//! reject with 401 before the request reaches any route handler.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use kanban_core_db::models::api_key::ApiKeyRecord;

use crate::error::ApiError;
use crate::state::AppState;

/// `Authorization: Bearer <key>` or `X-API-Key: <key>`. Shared with the
/// WebSocket upgrade handler, which has no `Request` body to extract from
/// by the time it needs a credential.
pub(crate) fn extract_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(text) = value.to_str() {
            if let Some(key) = text.strip_prefix("Bearer ") {
                return Some(key.to_string());
            }
        }
    }
    headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Checks `key` against the statically configured keys first, then the
/// `api_keys` table. Shared by the HTTP middleware and the WebSocket
/// upgrade handler so both surfaces authenticate identically.
pub(crate) async fn authenticate_key(state: &AppState, key: &str) -> Result<bool, kanban_core_services::ServiceError> {
    if state.config.auth.api_keys.iter().any(|k| k == key) {
        return Ok(true);
    }
    Ok(ApiKeyRecord::authenticate(state.storage.pool(), &state.config.auth.api_key_secret, key).await?.is_some())
}

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(key) = extract_key(request.headers()) else {
        return Err(ApiError::Unauthenticated);
    };

    if authenticate_key(&state, &key).await? {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::Unauthenticated)
    }
}
