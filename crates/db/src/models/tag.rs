use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TagError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("tag not found")]
    NotFound,
    #[error("a tag named '{0}' already exists")]
    DuplicateName(String),
    #[error("a tag cannot be its own ancestor")]
    CyclicParent,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub parent_id: Option<Uuid>,
    pub path: String,
    pub usage_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTag {
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub parent_id: Option<Uuid>,
}

const SELECT_TAG_COLUMNS: &str = "id, name, slug, color, parent_id, path, usage_count";

impl Tag {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Tag>(&format!("SELECT {SELECT_TAG_COLUMNS} FROM tags WHERE id = ?"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Tag>(&format!("SELECT {SELECT_TAG_COLUMNS} FROM tags ORDER BY path"))
            .fetch_all(executor)
            .await
    }

    pub async fn list_for_task<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Tag>(&format!(
            "SELECT t.id, t.name, t.slug, t.color, t.parent_id, t.path, t.usage_count \
             FROM tags t JOIN task_tags tt ON tt.tag_id = t.id WHERE tt.task_id = ? ORDER BY t.path"
        ))
        .bind(task_id)
        .fetch_all(executor)
        .await
    }

    /// Materializes `path` as `<parent.path>/<slug>` (or just `slug` for a
    /// root tag) so prefix queries over a subtree stay a single `LIKE`.
    pub async fn create(conn: &mut SqliteConnection, data: &CreateTag, id: Uuid) -> Result<Self, TagError> {
        let path = match data.parent_id {
            Some(parent_id) => {
                let parent = Self::find_by_id(&mut *conn, parent_id).await?.ok_or(TagError::NotFound)?;
                format!("{}/{}", parent.path, data.slug)
            }
            None => data.slug.clone(),
        };

        sqlx::query_as::<_, Tag>(&format!(
            "INSERT INTO tags (id, name, slug, color, parent_id, path) VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {SELECT_TAG_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.color)
        .bind(data.parent_id)
        .bind(&path)
        .fetch_one(conn)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                TagError::DuplicateName(data.name.clone())
            }
            _ => TagError::Database(e),
        })
    }

    pub async fn attach_to_task<'e, E>(executor: E, task_id: Uuid, tag_id: Uuid) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query("INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(tag_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn detach_from_task<'e, E>(executor: E, task_id: Uuid, tag_id: Uuid) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query("DELETE FROM task_tags WHERE task_id = ? AND tag_id = ?")
            .bind(task_id)
            .bind(tag_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn increment_usage<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query("UPDATE tags SET usage_count = usage_count + 1 WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Re-parents a tag, rewriting its own `path` and every descendant's
    /// `path` prefix atomically. Descendants are found via `LIKE old/%`
    /// before the rename, since SQLite has no recursive `UPDATE ... RETURNING`.
    pub async fn rewrite_subtree(
        conn: &mut SqliteConnection,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<(), TagError> {
        let tag = Self::find_by_id(&mut *conn, id).await?.ok_or(TagError::NotFound)?;

        let new_path = match new_parent_id {
            Some(parent_id) => {
                let parent = Self::find_by_id(&mut *conn, parent_id).await?.ok_or(TagError::NotFound)?;
                if parent.path == tag.path || parent.path.starts_with(&format!("{}/", tag.path)) {
                    return Err(TagError::CyclicParent);
                }
                format!("{}/{}", parent.path, tag.slug)
            }
            None => tag.slug.clone(),
        };

        let descendants: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT id, path FROM tags WHERE path LIKE ? ESCAPE '\\'",
        )
        .bind(format!("{}/%", escape_like(&tag.path)))
        .fetch_all(&mut *conn)
        .await?;

        sqlx::query("UPDATE tags SET parent_id = ?, path = ? WHERE id = ?")
            .bind(new_parent_id)
            .bind(&new_path)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        for (descendant_id, old_descendant_path) in descendants {
            let suffix = old_descendant_path
                .strip_prefix(&format!("{}/", tag.path))
                .unwrap_or(&old_descendant_path);
            let rewritten = format!("{new_path}/{suffix}");
            sqlx::query("UPDATE tags SET path = ? WHERE id = ?")
                .bind(rewritten)
                .bind(descendant_id)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }
}

fn escape_like(value: &str) -> String {
    value.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn open_memory() -> sqlx::SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite connects");
        crate::migrations::up(&pool, None).await.expect("migrations apply");
        pool
    }

    async fn create_tag(conn: &mut SqliteConnection, name: &str, slug: &str, parent_id: Option<Uuid>) -> Tag {
        let data = CreateTag { name: name.to_string(), slug: slug.to_string(), color: None, parent_id };
        Tag::create(conn, &data, Uuid::new_v4()).await.expect("tag creates")
    }

    #[tokio::test]
    async fn reparenting_rewrites_every_descendant_path() {
        let pool = open_memory().await;
        let mut conn = pool.acquire().await.expect("connection");

        let backend = create_tag(&mut conn, "Backend", "backend", None).await;
        let api = create_tag(&mut conn, "API", "api", Some(backend.id)).await;
        let auth = create_tag(&mut conn, "Auth", "auth", Some(api.id)).await;
        let frontend = create_tag(&mut conn, "Frontend", "frontend", None).await;

        assert_eq!(api.path, "backend/api");
        assert_eq!(auth.path, "backend/api/auth");

        Tag::rewrite_subtree(&mut conn, api.id, Some(frontend.id)).await.expect("reparents");

        let api = Tag::find_by_id(&mut *conn, api.id).await.expect("query").expect("exists");
        let auth = Tag::find_by_id(&mut *conn, auth.id).await.expect("query").expect("exists");
        assert_eq!(api.path, "frontend/api");
        assert_eq!(api.parent_id, Some(frontend.id));
        assert_eq!(auth.path, "frontend/api/auth", "descendant path must carry the new prefix");
    }

    #[tokio::test]
    async fn reparenting_under_its_own_descendant_is_rejected() {
        let pool = open_memory().await;
        let mut conn = pool.acquire().await.expect("connection");

        let backend = create_tag(&mut conn, "Backend", "backend", None).await;
        let api = create_tag(&mut conn, "API", "api", Some(backend.id)).await;

        let result = Tag::rewrite_subtree(&mut conn, backend.id, Some(api.id)).await;
        assert!(matches!(result, Err(TagError::CyclicParent)));
    }
}
