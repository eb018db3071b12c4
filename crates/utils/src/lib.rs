pub mod config;
pub mod pagination;
pub mod priority;
pub mod response;
pub mod telemetry;

pub use config::Config;
pub use priority::Priority;
pub use response::{ApiMeta, ApiResponse, ErrorBody};
