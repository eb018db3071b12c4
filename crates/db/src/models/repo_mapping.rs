use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum PatternType {
    Url,
    Name,
    Branch,
    ConfigFile,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RepoMapping {
    pub id: Uuid,
    pub pattern: String,
    pub pattern_type: PatternType,
    pub board_id: Uuid,
    pub priority: i64,
    /// JSON-encoded `Vec<String>`; kept as raw text since sqlite has no
    /// native array type and this is never queried, only round-tripped.
    pub default_tags: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRepoMapping {
    pub pattern: String,
    pub pattern_type: PatternType,
    pub board_id: Uuid,
    pub priority: i64,
    pub default_tags: Vec<String>,
}

const SELECT_MAPPING_COLUMNS: &str = "id, pattern, pattern_type, board_id, priority, default_tags";

impl RepoMapping {
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, RepoMapping>(&format!(
            "SELECT {SELECT_MAPPING_COLUMNS} FROM repo_mappings ORDER BY priority DESC"
        ))
        .fetch_all(executor)
        .await
    }

    pub async fn create<'e, E>(executor: E, data: &CreateRepoMapping, id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let default_tags = serde_json::to_string(&data.default_tags).unwrap_or_else(|_| "[]".to_string());
        sqlx::query_as::<_, RepoMapping>(&format!(
            "INSERT INTO repo_mappings (id, pattern, pattern_type, board_id, priority, default_tags) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {SELECT_MAPPING_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.pattern)
        .bind(data.pattern_type)
        .bind(data.board_id)
        .bind(data.priority)
        .bind(default_tags)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result = sqlx::query("DELETE FROM repo_mappings WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
