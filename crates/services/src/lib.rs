pub mod backup;
pub mod error;
pub mod events;
pub mod retry;
pub mod tag_service;
pub mod task_service;

pub use backup::BackupScheduler;
pub use error::ServiceError;
pub use events::{Event, EventHub, EventKind, Subscription};
pub use tag_service::TagService;
pub use task_service::TaskService;
