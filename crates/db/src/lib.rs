//! SQLite-backed storage engine and repository layer.
//!
//! A single [`StorageEngine`] owns the connection pool for the lifetime of
//! the process. Reads and single-statement writes go through repository
//! methods generic over `sqlx::Executor`; multi-statement operations that
//! must observe each other's effects take a `&mut SqliteConnection` carved
//! out of a transaction owned by the caller (typically the service layer).

pub mod error;
pub mod migrations;
pub mod models;
pub mod query;
pub mod seeds;
pub mod storage;

pub use error::StorageError;
pub use storage::{HealthStats, HealthStatus, StorageEngine};
