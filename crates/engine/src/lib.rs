//! Task hierarchy, dependency graph, and priority scoring — the pure
//! computation and thin async-orchestration layer between
//! `kanban-core-db`'s repositories and `kanban-core-services`'s
//! transaction boundaries. Graph algorithms in [`cycle`] take plain edge
//! lists so they can be unit tested without a database; [`hierarchy`] and
//! [`rollup`] carry the `SqliteConnection`-based orchestration that needs
//! one.

pub mod context;
pub mod cycle;
pub mod error;
pub mod hierarchy;
pub mod next_task;
pub mod priority;
pub mod rollup;

pub use error::EngineError;
