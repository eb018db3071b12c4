pub mod auth;
pub mod rate_limit;

pub use auth::require_api_key;
pub use rate_limit::{enforce_rate_limit, RateLimiter};
