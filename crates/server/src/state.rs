//! Shared server context injected into every handler, WebSocket connection,
//! and MCP tool call. One instance lives for the life of the process.

use std::sync::Arc;

use kanban_core_db::storage::StorageEngine;
use kanban_core_services::{BackupScheduler, EventHub, TagService, TaskService};
use kanban_core_utils::config::Config;

use crate::middleware::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub storage: StorageEngine,
    pub tasks: TaskService,
    pub tags: TagService,
    pub backups: BackupScheduler,
    pub events: EventHub,
    pub config: Arc<Config>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        storage: StorageEngine,
        tasks: TaskService,
        tags: TagService,
        backups: BackupScheduler,
        events: EventHub,
        config: Config,
    ) -> Self {
        Self {
            storage,
            tasks,
            tags,
            backups,
            events,
            config: Arc::new(config),
            rate_limiter: RateLimiter::new(),
        }
    }
}
