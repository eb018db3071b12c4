//! MCP stdio entrypoint. Stdout is reserved for the JSON-RPC transport, so
//! all logging goes to stderr.

use std::path::PathBuf;

use kanban_core_db::storage::StorageEngine;
use kanban_core_server::mcp::KanbanMcpServer;
use kanban_core_server::state::AppState;
use kanban_core_services::{BackupScheduler, EventHub, TagService, TaskService};
use kanban_core_utils::config::Config;
use kanban_core_utils::telemetry::init_tracing_stderr;
use rmcp::transport::stdio;
use rmcp::ServiceExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing_stderr();

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

    let state = AppState::new(storage, tasks, tags, backups, events, config);

    tracing::info!("kanban-core MCP server starting on stdio");
    let service = KanbanMcpServer::new(state).serve(stdio()).await.inspect_err(|error| {
        tracing::error!(%error, "failed to start MCP service");
    })?;
    service.waiting().await?;
    Ok(())
}
