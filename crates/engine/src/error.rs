use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the hierarchy, dependency, and rollup operations. The
/// service layer maps these onto the HTTP/MCP error taxonomy.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("task {0} not found")]
    NotFound(Uuid),
    #[error("subtask nesting depth exceeded")]
    DepthExceeded,
    #[error("parent task is on a different board")]
    CrossBoard,
    #[error("a task cannot depend on itself")]
    SelfDependency,
    #[error("dependency already exists")]
    Duplicate,
    #[error("adding this dependency would create a cycle")]
    Cycle,
    #[error("task has open children")]
    HasOpenChildren,
}
