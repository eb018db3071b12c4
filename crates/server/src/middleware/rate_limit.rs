//! Fixed-window inbound rate limit, keyed by credential. The window
//! (60s) and ceiling (100) match the WebSocket gateway's inbound-message
//! limit — one default serves both transports rather than tracking two.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;

use crate::error::ApiError;
use crate::state::AppState;

pub const WINDOW: Duration = Duration::from_secs(60);
pub const MAX_REQUESTS: u32 = 100;

struct Window {
    started_at: Instant,
    count: u32,
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Ok((remaining, reset_in_secs))` if the request is admitted,
    /// `Err(retry_after)` if the window's ceiling is already spent.
    fn check(&self, key: &str) -> Result<(u32, u64), u64> {
        let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| Window {
            started_at: Instant::now(),
            count: 0,
        });

        if entry.started_at.elapsed() >= WINDOW {
            entry.started_at = Instant::now();
            entry.count = 0;
        }

        let reset_in = WINDOW.saturating_sub(entry.started_at.elapsed()).as_secs().max(1);
        if entry.count >= MAX_REQUESTS {
            return Err(reset_in);
        }

        entry.count += 1;
        Ok((MAX_REQUESTS - entry.count, reset_in))
    }
}

fn client_key(request: &Request) -> String {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .or_else(|| request.headers().get("X-API-Key"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&request);
    match state.rate_limiter.check(&key) {
        Ok((remaining, reset_in_secs)) => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("X-Rate-Limit-Remaining", HeaderValue::from(remaining));
            headers.insert("X-Rate-Limit-Reset", HeaderValue::from(reset_in_secs));
            Ok(response)
        }
        Err(retry_after_secs) => Err(ApiError::RateLimited { retry_after_secs }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_ceiling_then_rejects() {
        let limiter = RateLimiter::new();
        for i in 0..MAX_REQUESTS {
            let (remaining, _) = limiter.check("client").expect("admitted within ceiling");
            assert_eq!(remaining, MAX_REQUESTS - (i + 1));
        }
        let retry_after = limiter.check("client").expect_err("ceiling already spent");
        assert!(retry_after >= 1);
    }

    #[test]
    fn different_clients_have_independent_windows() {
        let limiter = RateLimiter::new();
        for _ in 0..MAX_REQUESTS {
            limiter.check("a").expect("a admitted");
        }
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_ok());
    }
}
