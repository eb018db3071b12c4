//! Transactional task operations. Every mutating method follows the same
//! shape: open a transaction, do the reads/writes and engine-level
//! validation against it, commit, then publish the resulting event — so a
//! rollback (a validation failure partway through) never produces an
//! event the caller didn't actually get. Acquire the transaction before
//! ever touching the event hub; nothing here holds the hub across a `.await`
//! on the database.

use kanban_core_db::models::{
    Column, CreateNote, CreateTask, Dependency, DependencyType, Note, Tag, Task, TaskStatus, UpdateTask,
};
use kanban_core_engine::cycle::{adjacency_by_blocker, would_cycle};
use kanban_core_engine::next_task::{select_next_task, NextTaskFilter, NextTaskResult};
use kanban_core_engine::priority::compute_board_scores;
use kanban_core_engine::{hierarchy, rollup};
use kanban_core_utils::config::PriorityWeights;
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::events::{EventHub, EventKind};

#[derive(Clone)]
pub struct TaskService {
    pool: SqlitePool,
    events: EventHub,
    weights: PriorityWeights,
}

impl TaskService {
    pub fn new(pool: SqlitePool, events: EventHub, weights: PriorityWeights) -> Self {
        Self { pool, events, weights }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// A task is blocked iff some `blocks` predecessor isn't done or
    /// archived. Re-derives that from the current edge list and the
    /// predecessors' current statuses, flips `Blocked`/`Todo` if it
    /// disagrees with the stored status, and reports which (if either)
    /// happened so the caller can publish the matching event after commit.
    async fn recompute_one_task_blocked(
        tx: &mut sqlx::SqliteConnection,
        board_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<EventKind>, ServiceError> {
        let task = Task::find_by_id(&mut *tx, task_id).await?.ok_or(ServiceError::TaskNotFound(task_id))?;
        let edges = Dependency::blocks_edges_for_board(&mut *tx, board_id).await?;

        let mut still_blocked = false;
        for &(blocked, blocker) in &edges {
            if blocked != task_id {
                continue;
            }
            if let Some(predecessor) = Task::find_by_id(&mut *tx, blocker).await? {
                if !matches!(predecessor.status, TaskStatus::Done | TaskStatus::Archived) {
                    still_blocked = true;
                    break;
                }
            }
        }

        if still_blocked && task.status != TaskStatus::Blocked {
            Task::set_status(&mut *tx, task_id, TaskStatus::Blocked).await?;
            return Ok(Some(EventKind::DependencyBlocked));
        }
        if !still_blocked && task.status == TaskStatus::Blocked {
            Task::set_status(&mut *tx, task_id, TaskStatus::Todo).await?;
            return Ok(Some(EventKind::DependencyUnblocked));
        }
        Ok(None)
    }

    async fn load_column_checked(
        tx: &mut sqlx::SqliteConnection,
        board_id: Uuid,
        column_id: Uuid,
    ) -> Result<Column, ServiceError> {
        let column = Column::find_by_id(&mut *tx, column_id)
            .await?
            .ok_or(ServiceError::ColumnMismatch { column_id, board_id })?;
        if column.board_id != board_id {
            return Err(ServiceError::ColumnMismatch { column_id, board_id });
        }
        Ok(column)
    }

    pub async fn create_task(&self, data: &CreateTask) -> Result<Task, ServiceError> {
        let mut tx = self.pool.begin().await?;
        Self::load_column_checked(&mut tx, data.board_id, data.column_id).await?;

        let id = Uuid::new_v4();
        let task = Task::create(&mut tx, data, id).await?;
        rollup::recompute_from(&mut tx, task.id).await?;
        tx.commit().await?;

        self.events
            .publish(task.board_id, EventKind::TaskCreated, json!({ "task_id": task.id }))
            .await;
        Ok(task)
    }

    pub async fn create_subtask(
        &self,
        parent_id: Uuid,
        column_id: Uuid,
        data: &CreateTask,
    ) -> Result<Task, ServiceError> {
        let mut tx = self.pool.begin().await?;
        Self::load_column_checked(&mut tx, data.board_id, column_id).await?;

        let id = Uuid::new_v4();
        let task = hierarchy::create_subtask(&mut tx, parent_id, column_id, data, id).await?;
        tx.commit().await?;

        self.events
            .publish(
                task.board_id,
                EventKind::TaskCreated,
                json!({ "task_id": task.id, "parent_task_id": parent_id }),
            )
            .await;
        Ok(task)
    }

    pub async fn update_task(&self, task_id: Uuid, data: &UpdateTask) -> Result<Task, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let task = Task::update_fields(&mut tx, task_id, data)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_id))?;
        tx.commit().await?;

        self.events
            .publish(task.board_id, EventKind::TaskUpdated, json!({ "task_id": task.id }))
            .await;
        Ok(task)
    }

    /// `UpdateTaskStatus`: closing a task to `done` fails `HAS_OPEN_CHILDREN`
    /// if any direct child isn't itself done or archived. Every status
    /// change re-walks the rollup from this task to the root.
    pub async fn update_task_status(&self, task_id: Uuid, status: TaskStatus) -> Result<Task, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let existing = Task::find_by_id(&mut *tx, task_id)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_id))?;

        if status == TaskStatus::Done {
            rollup::assert_closable(&mut tx, task_id).await?;
        }

        let task = Task::set_status(&mut tx, task_id, status)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_id))?;
        rollup::recompute_from(&mut tx, task_id).await?;

        let edges = Dependency::blocks_edges_for_board(&mut *tx, task.board_id).await?;
        let successors = adjacency_by_blocker(&edges).remove(&task_id).unwrap_or_default();
        let mut blocked_events = Vec::new();
        for successor in successors {
            if let Some(kind) = Self::recompute_one_task_blocked(&mut tx, task.board_id, successor).await? {
                blocked_events.push((successor, kind));
            }
        }

        tx.commit().await?;

        self.events
            .publish(
                task.board_id,
                EventKind::TaskStatusChanged,
                json!({ "task_id": task.id, "status": task.status }),
            )
            .await;
        if task.parent_task_id.is_some() && status == TaskStatus::Done && existing.status != TaskStatus::Done {
            self.events
                .publish(task.board_id, EventKind::SubtaskCompleted, json!({ "task_id": task.id }))
                .await;
        }
        for (successor, kind) in blocked_events {
            self.events.publish(task.board_id, kind, json!({ "task_id": successor })).await;
        }
        Ok(task)
    }

    /// `MoveTask`: reassigns column (and therefore board-relative position),
    /// rejecting a target column on a different board.
    pub async fn move_task(&self, task_id: Uuid, new_column_id: Uuid, new_position: i64) -> Result<Task, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let existing = Task::find_by_id(&mut *tx, task_id)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_id))?;
        Self::load_column_checked(&mut tx, existing.board_id, new_column_id).await?;

        Task::move_to_column(&mut tx, task_id, new_column_id, new_position).await?;
        let task = Task::find_by_id(&mut *tx, task_id)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_id))?;
        tx.commit().await?;

        self.events
            .publish(
                task.board_id,
                EventKind::TaskMoved,
                json!({ "task_id": task.id, "column_id": task.column_id }),
            )
            .await;
        Ok(task)
    }

    pub async fn delete_task(&self, task_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        let existing = Task::find_by_id(&mut *tx, task_id)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_id))?;
        Task::delete(&mut tx, task_id).await?;
        if let Some(parent_id) = existing.parent_task_id {
            rollup::recompute_from(&mut tx, parent_id).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// `AddDependency`: rejects a `blocks` edge that would close a cycle in
    /// the board's blocking subgraph, loaded fresh inside the transaction so
    /// concurrent writers can't race past the check.
    pub async fn add_dependency(
        &self,
        task_id: Uuid,
        depends_on_task_id: Uuid,
        dependency_type: DependencyType,
    ) -> Result<Dependency, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let task = Task::find_by_id(&mut *tx, task_id)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_id))?;

        if dependency_type == DependencyType::Blocks {
            let edges = Dependency::blocks_edges_for_board(&mut *tx, task.board_id).await?;
            let adjacency = adjacency_by_blocker(&edges);
            if would_cycle(&adjacency, task_id, depends_on_task_id) {
                return Err(ServiceError::Cycle);
            }
        }

        let dependency = Dependency::create(&mut *tx, task_id, depends_on_task_id, dependency_type)
            .await
            .map_err(|e| match e {
                kanban_core_db::models::dependency::DependencyError::SelfReference => ServiceError::SelfDependency,
                kanban_core_db::models::dependency::DependencyError::Duplicate => ServiceError::Duplicate,
                kanban_core_db::models::dependency::DependencyError::WouldCycle => ServiceError::Cycle,
                kanban_core_db::models::dependency::DependencyError::Database(e) => e.into(),
            })?;

        let blocked_event = if dependency_type == DependencyType::Blocks {
            Self::recompute_one_task_blocked(&mut tx, task.board_id, task_id).await?
        } else {
            None
        };
        tx.commit().await?;

        self.events
            .publish(
                task.board_id,
                EventKind::DependencyAdded,
                json!({ "task_id": task_id, "depends_on_task_id": depends_on_task_id }),
            )
            .await;
        if let Some(kind) = blocked_event {
            self.events.publish(task.board_id, kind, json!({ "task_id": task_id })).await;
        }
        Ok(dependency)
    }

    pub async fn remove_dependency(&self, task_id: Uuid, depends_on_task_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        let task = Task::find_by_id(&mut *tx, task_id)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_id))?;
        Dependency::delete(&mut *tx, task_id, depends_on_task_id).await?;
        let blocked_event = Self::recompute_one_task_blocked(&mut tx, task.board_id, task_id).await?;
        tx.commit().await?;

        self.events
            .publish(
                task.board_id,
                EventKind::DependencyRemoved,
                json!({ "task_id": task_id, "depends_on_task_id": depends_on_task_id }),
            )
            .await;
        if let Some(kind) = blocked_event {
            self.events.publish(task.board_id, kind, json!({ "task_id": task_id })).await;
        }
        Ok(())
    }

    pub async fn add_note(&self, data: &CreateNote) -> Result<Note, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let note = Note::create(&mut *tx, data, Uuid::new_v4()).await?;
        tx.commit().await?;

        self.events
            .publish(note.board_id, EventKind::NoteAdded, json!({ "task_id": note.task_id, "note_id": note.id }))
            .await;
        Ok(note)
    }

    /// Board-wide priority recompute: single pass, persists every active
    /// task's `priority_score`, then publishes one summary event rather
    /// than one per task.
    pub async fn recompute_priorities(&self, board_id: Uuid) -> Result<usize, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let tasks = Task::all_on_board(&mut *tx, board_id).await?;
        let edges = Dependency::blocks_edges_for_board(&mut *tx, board_id).await?;
        let scored = compute_board_scores(&tasks, &edges, &self.weights, chrono::Utc::now());
        for entry in &scored {
            Task::set_priority_score(&mut tx, entry.task_id, entry.score).await?;
        }
        tx.commit().await?;

        self.events
            .publish(board_id, EventKind::PriorityChanged, json!({ "count": scored.len() }))
            .await;
        Ok(scored.len())
    }

    /// `GetNextTask`: ranks active candidates fresh (not from the last
    /// persisted recompute) so a transient skill-tag bonus can be layered
    /// on without mutating stored scores.
    pub async fn get_next_task(&self, filter: &NextTaskFilter) -> Result<Option<NextTaskResult>, ServiceError> {
        let board_id = filter.board_id.ok_or_else(|| {
            ServiceError::Validation("get_next_task requires a board_id".to_string())
        })?;

        crate::retry::retry_read(|| async {
            let mut conn = self.pool.acquire().await?;
            let tasks = Task::all_on_board(&mut *conn, board_id).await?;
            let edges = Dependency::blocks_edges_for_board(&mut *conn, board_id).await?;

            let mut task_tags: HashMap<Uuid, Vec<String>> = HashMap::new();
            for task in &tasks {
                let tags = Tag::list_for_task(&mut *conn, task.id).await?;
                task_tags.insert(task.id, tags.into_iter().map(|t| t.name).collect());
            }

            let scores = compute_board_scores(&tasks, &edges, &self.weights, chrono::Utc::now());
            Ok(select_next_task(&tasks, &edges, &task_tags, &scores, filter))
        })
        .await
    }
}
