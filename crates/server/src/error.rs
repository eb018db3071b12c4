//! Maps service-layer and transport-layer failures onto the wire error
//! taxonomy from the external-interfaces contract: a stable `code`, a
//! human message, and the right HTTP status. Internal errors are logged
//! with a trace id and never leak their details to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kanban_core_services::ServiceError;
use uuid::Uuid;

use kanban_core_utils::response::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error("{0}")]
    BadRequest(String),
    #[error("restore in progress, database is unavailable")]
    Unavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Service(service_error) => service_error_response(service_error),
            ApiError::Unauthenticated => {
                let body = ApiResponse::<()>::error("UNAUTHORIZED", "missing or invalid credential");
                (StatusCode::UNAUTHORIZED, Json(body)).into_response()
            }
            ApiError::RateLimited { retry_after_secs } => {
                let body = ApiResponse::<()>::error("RATE_LIMITED", "too many requests");
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert("Retry-After", retry_after_secs.into());
                response
            }
            ApiError::BadRequest(message) => {
                let body = ApiResponse::<()>::error("VALIDATION", message);
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::Unavailable => {
                let body = ApiResponse::<()>::error("UNAVAILABLE", "a restore is in progress");
                (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
            }
        }
    }
}

fn service_error_response(error: ServiceError) -> Response {
    let code = error.code();
    let status = match &error {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::BoardNotFound(_) | ServiceError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::ColumnMismatch { .. }
        | ServiceError::HasOpenChildren
        | ServiceError::SelfDependency
        | ServiceError::Duplicate
        | ServiceError::Cycle
        | ServiceError::DepthExceeded
        | ServiceError::CrossBoard => StatusCode::CONFLICT,
        ServiceError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        let trace_id = Uuid::new_v4();
        tracing::error!(%trace_id, error = %error, "internal error");
        let body = ApiResponse::<()>::error_with_details(
            code,
            "an internal error occurred",
            serde_json::json!({ "trace_id": trace_id }),
        );
        return (status, Json(body)).into_response();
    }

    let body = ApiResponse::<()>::error(code, error.to_string());
    (status, Json(body)).into_response()
}
