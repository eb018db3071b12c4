//! Numbered `NNN_description` migrations with `up`/`down` SQL and a content
//! checksum, applied/reversed one at a time inside their own transaction.
//! Mirrors the schema-lifecycle design in the storage engine spec: a
//! `schema_migrations` table records `(id, applied_at, checksum)`, and
//! checksum drift between an applied migration and its on-disk content is
//! reported rather than silently skipped.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::error::StorageError;

pub struct Migration {
    pub id: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

impl Migration {
    fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.up_sql.as_bytes());
        hasher.update(self.down_sql.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// All migrations known to this build, in ascending id order.
pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "0001_init",
            up_sql: include_str!("../migrations/0001_init.up.sql"),
            down_sql: include_str!("../migrations/0001_init.down.sql"),
        },
        Migration {
            id: "0002_board_archived_index",
            up_sql: include_str!("../migrations/0002_board_archived_index.up.sql"),
            down_sql: include_str!("../migrations/0002_board_archived_index.down.sql"),
        },
    ]
}

async fn ensure_migration_tables(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            id TEXT PRIMARY KEY,
            applied_at DATETIME NOT NULL DEFAULT (datetime('now', 'subsec')),
            checksum TEXT NOT NULL
         )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn applied_migrations(
    pool: &SqlitePool,
) -> Result<Vec<(String, String)>, StorageError> {
    let rows = sqlx::query("SELECT id, checksum FROM schema_migrations ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get::<String, _>("id"), row.get::<String, _>("checksum")))
        .collect())
}

/// Apply all pending migrations up to (and including) `target`, or all of
/// them when `target` is `None`. Verifies no checksum drift on already
/// applied migrations before applying anything new.
pub async fn up(pool: &SqlitePool, target: Option<&str>) -> Result<usize, StorageError> {
    ensure_migration_tables(pool).await?;
    let migrations = all_migrations();
    let applied = applied_migrations(pool).await?;
    let applied_by_id: std::collections::HashMap<_, _> = applied.into_iter().collect();

    for migration in &migrations {
        if let Some(checksum) = applied_by_id.get(migration.id) {
            if *checksum != migration.checksum() {
                return Err(StorageError::MigrationChecksumMismatch {
                    id: migration.id.to_string(),
                    expected: checksum.clone(),
                    found: migration.checksum(),
                });
            }
        }
    }

    let mut applied_count = 0;
    for migration in &migrations {
        if applied_by_id.contains_key(migration.id) {
            continue;
        }
        apply_one(pool, migration).await?;
        applied_count += 1;
        if target.is_some_and(|t| t == migration.id) {
            break;
        }
    }
    Ok(applied_count)
}

async fn apply_one(pool: &SqlitePool, migration: &Migration) -> Result<(), StorageError> {
    let span = tracing::info_span!("migration_up", id = migration.id);
    let _enter = span.enter();

    let mut tx = pool.begin().await?;
    let statements = split_statements(migration.up_sql);
    for statement in statements {
        if let Err(source) = sqlx::query(statement).execute(&mut *tx).await {
            return Err(StorageError::MigrationFailed {
                id: migration.id.to_string(),
                source,
            });
        }
    }
    sqlx::query("INSERT INTO schema_migrations (id, checksum) VALUES (?, ?)")
        .bind(migration.id)
        .bind(migration.checksum())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    tracing::info!("applied migration {}", migration.id);
    Ok(())
}

/// Reverse applied migrations from newest back to (exclusive of) `target`,
/// or all of them when `target` is `None`.
pub async fn down(pool: &SqlitePool, target: Option<&str>) -> Result<usize, StorageError> {
    let migrations = all_migrations();
    let applied_ids: std::collections::HashSet<String> = applied_migrations(pool)
        .await?
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    let mut reversed = 0;
    for migration in migrations.iter().rev() {
        if Some(migration.id) == target {
            break;
        }
        if !applied_ids.contains(migration.id) {
            continue;
        }
        let mut tx = pool.begin().await?;
        for statement in split_statements(migration.down_sql) {
            if let Err(source) = sqlx::query(statement).execute(&mut *tx).await {
                return Err(StorageError::MigrationFailed {
                    id: migration.id.to_string(),
                    source,
                });
            }
        }
        sqlx::query("DELETE FROM schema_migrations WHERE id = ?")
            .bind(migration.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        reversed += 1;
        tracing::info!("reversed migration {}", migration.id);
    }
    Ok(reversed)
}

/// SQLite's driver executes one statement per call; migrations are
/// authored as multiple `;`-terminated statements in one file. A plain
/// `split(';')` would cut a trigger's `BEGIN ... END` body apart at its
/// internal semicolons, so `;` only ends a statement outside any
/// `BEGIN`/`END` nesting.
fn split_statements(sql: &'static str) -> Vec<&'static str> {
    let mut statements = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0usize;
    let mut i = 0usize;
    let len = sql.len();

    while i < len {
        let c = sql.as_bytes()[i];
        let at_word_start = is_word_byte(c) && (i == 0 || !is_word_byte(sql.as_bytes()[i - 1]));
        if at_word_start {
            let mut end = i;
            while end < len && is_word_byte(sql.as_bytes()[end]) {
                end += 1;
            }
            let word = &sql[i..end];
            if word.eq_ignore_ascii_case("begin") {
                depth += 1;
            } else if word.eq_ignore_ascii_case("end") {
                depth -= 1;
            }
            i = end;
            continue;
        }
        if c == b';' && depth == 0 {
            let stmt = sql[start..i].trim();
            if !stmt.is_empty() {
                statements.push(stmt);
            }
            start = i + 1;
        }
        i += 1;
    }
    let tail = sql[start..].trim();
    if !tail.is_empty() {
        statements.push(tail);
    }
    statements
}

fn is_word_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite connects")
    }

    #[tokio::test]
    async fn running_pending_migrations_twice_applies_once() {
        let pool = memory_pool().await;
        let first = up(&pool, None).await.expect("first run applies migrations");
        assert_eq!(first, all_migrations().len());
        let second = up(&pool, None).await.expect("second run is a no-op");
        assert_eq!(second, 0);
    }

    #[test]
    fn split_statements_keeps_trigger_body_whole() {
        let sql = "CREATE TABLE t (id INTEGER);\n\
             CREATE TRIGGER trg AFTER INSERT ON t BEGIN\n\
                 INSERT INTO t (id) VALUES (1);\n\
                 INSERT INTO t (id) VALUES (2);\n\
             END;\n\
             CREATE INDEX idx_t ON t (id);";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 3);
        assert!(statements[1].starts_with("CREATE TRIGGER"));
        assert!(statements[1].trim_end().ends_with("END"));
        assert_eq!(statements[1].matches(';').count(), 2);
    }

    #[tokio::test]
    async fn down_reverses_in_reverse_order() {
        let pool = memory_pool().await;
        up(&pool, None).await.expect("migrations apply");
        let reversed = down(&pool, None).await.expect("migrations reverse");
        assert_eq!(reversed, all_migrations().len());
        let remaining = applied_migrations(&pool).await.expect("query succeeds");
        assert!(remaining.is_empty());
    }
}
