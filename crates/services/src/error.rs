use kanban_core_engine::EngineError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the service layer, shaped to map 1:1 onto the
/// HTTP/MCP error taxonomy: validation (400), not-found (404), conflict
/// (409, with a domain-specific code), and transient storage errors (503,
/// retried by the caller before giving up).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("board {0} not found")]
    BoardNotFound(Uuid),
    #[error("task {0} not found")]
    TaskNotFound(Uuid),
    #[error("column {column_id} does not belong to board {board_id}")]
    ColumnMismatch { column_id: Uuid, board_id: Uuid },
    #[error("task has open children")]
    HasOpenChildren,
    #[error("a task cannot depend on itself")]
    SelfDependency,
    #[error("dependency already exists")]
    Duplicate,
    #[error("adding this dependency would create a cycle")]
    Cycle,
    #[error("subtask nesting depth exceeded")]
    DepthExceeded,
    #[error("parent task is on a different board")]
    CrossBoard,
    #[error("database error")]
    Transient(#[source] sqlx::Error),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

/// Machine-readable error code, stable across releases, surfaced in the
/// JSON error envelope alongside the human-readable message.
impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION",
            ServiceError::BoardNotFound(_) | ServiceError::TaskNotFound(_) => "NOT_FOUND",
            ServiceError::ColumnMismatch { .. } => "COLUMN_MISMATCH",
            ServiceError::HasOpenChildren => "HAS_OPEN_CHILDREN",
            ServiceError::SelfDependency => "SELF_DEPENDENCY",
            ServiceError::Duplicate => "DUPLICATE",
            ServiceError::Cycle => "CYCLE",
            ServiceError::DepthExceeded => "DEPTH_EXCEEDED",
            ServiceError::CrossBoard => "CROSS_BOARD",
            ServiceError::Transient(_) => "TRANSIENT",
            ServiceError::Internal(_) => "INTERNAL",
        }
    }

    /// Transient storage errors are retried by the caller up to 3 times
    /// with exponential backoff before surfacing; everything else is final.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ServiceError::Transient(_))
    }
}

impl From<EngineError> for ServiceError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::Database(e) => e.into(),
            EngineError::NotFound(id) => ServiceError::TaskNotFound(id),
            EngineError::DepthExceeded => ServiceError::DepthExceeded,
            EngineError::CrossBoard => ServiceError::CrossBoard,
            EngineError::SelfDependency => ServiceError::SelfDependency,
            EngineError::Duplicate => ServiceError::Duplicate,
            EngineError::Cycle => ServiceError::Cycle,
            EngineError::HasOpenChildren => ServiceError::HasOpenChildren,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(value: sqlx::Error) -> Self {
        ServiceError::Transient(value)
    }
}
