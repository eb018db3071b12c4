use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("a task cannot depend on itself")]
    SelfReference,
    #[error("dependency already exists")]
    Duplicate,
    #[error("adding this dependency would create a cycle")]
    WouldCycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum DependencyType {
    Blocks,
    Related,
    ParentChild,
}

const SELECT_DEP_COLUMNS: &str = "task_id, depends_on_task_id, type AS dependency_type";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Dependency {
    pub task_id: Uuid,
    pub depends_on_task_id: Uuid,
    pub dependency_type: DependencyType,
}

impl Dependency {
    pub async fn list_for_task<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Dependency>(&format!(
            "SELECT {SELECT_DEP_COLUMNS} FROM task_dependencies WHERE task_id = ?"
        ))
        .bind(task_id)
        .fetch_all(executor)
        .await
    }

    pub async fn list_dependents<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Dependency>(&format!(
            "SELECT {SELECT_DEP_COLUMNS} FROM task_dependencies WHERE depends_on_task_id = ?"
        ))
        .bind(task_id)
        .fetch_all(executor)
        .await
    }

    /// All `blocks` edges on the board, for the cycle-detection and
    /// critical-path walks in `kanban-core-engine`. Loading the whole
    /// subgraph once is cheaper than one query per visited node.
    pub async fn blocks_edges_for_board<'e, E>(
        executor: E,
        board_id: Uuid,
    ) -> Result<Vec<(Uuid, Uuid)>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT d.task_id, d.depends_on_task_id FROM task_dependencies d \
             JOIN tasks t ON t.id = d.task_id \
             WHERE t.board_id = ? AND d.type = 'blocks'",
        )
        .bind(board_id)
        .fetch_all(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        task_id: Uuid,
        depends_on_task_id: Uuid,
        dependency_type: DependencyType,
    ) -> Result<Self, DependencyError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        if task_id == depends_on_task_id {
            return Err(DependencyError::SelfReference);
        }

        sqlx::query_as::<_, Dependency>(&format!(
            "INSERT INTO task_dependencies (task_id, depends_on_task_id, type) VALUES (?, ?, ?) \
             RETURNING {SELECT_DEP_COLUMNS}"
        ))
        .bind(task_id)
        .bind(depends_on_task_id)
        .bind(dependency_type)
        .fetch_one(executor)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DependencyError::Duplicate,
            _ => DependencyError::Database(e),
        })
    }

    pub async fn delete<'e, E>(
        executor: E,
        task_id: Uuid,
        depends_on_task_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result = sqlx::query(
            "DELETE FROM task_dependencies WHERE task_id = ? AND depends_on_task_id = ?",
        )
        .bind(task_id)
        .bind(depends_on_task_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
