//! Tag CRUD and task attachment, with the usage counter and events that
//! go along with it. Hierarchy rewrites (`rewrite_subtree`) are exposed
//! as-is from `kanban-core-db` since they're already a single atomic unit;
//! this layer only adds the transaction boundary and event publication.

use kanban_core_db::models::{CreateTag, Tag};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::events::{EventHub, EventKind};

#[derive(Clone)]
pub struct TagService {
    pool: SqlitePool,
    events: EventHub,
}

impl TagService {
    pub fn new(pool: SqlitePool, events: EventHub) -> Self {
        Self { pool, events }
    }

    pub async fn create_tag(&self, data: &CreateTag) -> Result<Tag, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let tag = Tag::create(&mut tx, data, Uuid::new_v4())
            .await
            .map_err(|e| match e {
                kanban_core_db::models::tag::TagError::DuplicateName(name) => {
                    ServiceError::Validation(format!("a tag named '{name}' already exists"))
                }
                kanban_core_db::models::tag::TagError::NotFound => {
                    ServiceError::Validation("parent tag not found".to_string())
                }
                kanban_core_db::models::tag::TagError::CyclicParent => {
                    ServiceError::Validation("a tag cannot be its own ancestor".to_string())
                }
                kanban_core_db::models::tag::TagError::Database(e) => e.into(),
            })?;
        tx.commit().await?;

        // Tags aren't board-scoped; report under the nil board so
        // subscribers filtering by a specific board don't see it, while
        // "*" subscribers (the common case for tag management UIs) do.
        self.events
            .publish(Uuid::nil(), EventKind::TagCreated, json!({ "tag_id": tag.id }))
            .await;
        Ok(tag)
    }

    pub async fn attach(&self, board_id: Uuid, task_id: Uuid, tag_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        Tag::attach_to_task(&mut *tx, task_id, tag_id).await?;
        Tag::increment_usage(&mut *tx, tag_id).await?;
        tx.commit().await?;

        self.events
            .publish(board_id, EventKind::TagAttached, json!({ "task_id": task_id, "tag_id": tag_id }))
            .await;
        Ok(())
    }

    pub async fn detach(&self, board_id: Uuid, task_id: Uuid, tag_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        Tag::detach_from_task(&mut *tx, task_id, tag_id).await?;
        tx.commit().await?;

        self.events
            .publish(board_id, EventKind::TagDetached, json!({ "task_id": task_id, "tag_id": tag_id }))
            .await;
        Ok(())
    }

    pub async fn reparent(&self, id: Uuid, new_parent_id: Option<Uuid>) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        Tag::rewrite_subtree(&mut tx, id, new_parent_id)
            .await
            .map_err(|e| match e {
                kanban_core_db::models::tag::TagError::CyclicParent => {
                    ServiceError::Validation("a tag cannot be its own ancestor".to_string())
                }
                kanban_core_db::models::tag::TagError::NotFound => ServiceError::Validation("tag not found".to_string()),
                kanban_core_db::models::tag::TagError::DuplicateName(name) => {
                    ServiceError::Validation(format!("a tag named '{name}' already exists"))
                }
                kanban_core_db::models::tag::TagError::Database(e) => e.into(),
            })?;
        tx.commit().await?;
        Ok(())
    }
}
