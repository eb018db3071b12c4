//! HTTP + WebSocket entrypoint. Reads configuration from the environment,
//! opens the database, wires the service layer and event hub, and serves
//! the combined `/api` + `/ws` surface. Spawns the backup scheduler
//! alongside when `BACKUP_ENABLED` is set.

use std::path::PathBuf;

use kanban_core_db::storage::StorageEngine;
use kanban_core_server::state::AppState;
use kanban_core_services::{BackupScheduler, EventHub, TagService, TaskService};
use kanban_core_utils::config::Config;
use kanban_core_utils::telemetry::init_tracing_stdout;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing_stdout();

    let config = Config::from_env()?;
    let storage = StorageEngine::open(&config.database).await?;
    let events = EventHub::new();

    let tasks = TaskService::new(storage.pool().clone(), events.clone(), config.priority_weights.clone());
    let tags = TagService::new(storage.pool().clone(), events.clone());
    let backups = BackupScheduler::new(
        storage.pool().clone(),
        events.clone(),
        PathBuf::from(&config.database.path),
        PathBuf::from(&config.backup.dir),
        config.backup.retention_days,
        config.backup.max_count,
    );

    if config.backup.enabled {
        let scheduler = backups.clone();
        if let Err(error) = scheduler.spawn(&config.backup.schedule) {
            tracing::error!(%error, "failed to start backup scheduler, continuing without it");
        }
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(storage, tasks, tags, backups, events, config);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "kanban-core-server listening");

    axum::serve(listener, kanban_core_server::app(state)).await?;
    Ok(())
}
