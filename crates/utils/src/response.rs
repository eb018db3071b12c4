//! The envelope every HTTP response is wrapped in: `{success, data?, error?, meta}`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::pagination::PaginationMeta;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub meta: ApiMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ApiMeta {
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl ApiMeta {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: Uuid::new_v4(),
            pagination: None,
        }
    }

    pub fn with_pagination(pagination: PaginationMeta) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::new()
        }
    }
}

impl Default for ApiMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: ApiMeta::new(),
        }
    }

    pub fn success_paginated(data: T, pagination: PaginationMeta) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: ApiMeta::with_pagination(pagination),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            }),
            meta: ApiMeta::new(),
        }
    }

    pub fn error_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            }),
            meta: ApiMeta::new(),
        }
    }
}
