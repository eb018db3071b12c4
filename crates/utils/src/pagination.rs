use serde::{Deserialize, Serialize};

/// `limit`/`offset` query params, clamped per spec: limit in [1,1000], offset >= 0.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PaginationParams {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(50).clamp(1, 1000)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    #[serde(rename = "hasNext")]
    pub has_next: bool,
    #[serde(rename = "hasPrev")]
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(params: PaginationParams, total: u64) -> Self {
        let limit = params.limit();
        let offset = params.offset();
        let page = offset / limit + 1;
        Self {
            page,
            limit,
            total,
            has_next: u64::from(offset) + u64::from(limit) < total,
            has_prev: offset > 0,
        }
    }
}
