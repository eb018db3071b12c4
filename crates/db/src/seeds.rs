//! Idempotent seed data, recorded in `seed_status` the same way migrations
//! are recorded in `schema_migrations`. Re-running a seed is a no-op unless
//! `force` is set.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::error::StorageError;

struct Seed {
    name: &'static str,
    sql: &'static str,
}

fn all_seeds() -> Vec<Seed> {
    vec![Seed {
        name: "default_board",
        sql: "INSERT INTO boards (id, name, description) \
              VALUES ('00000000-0000-0000-0000-000000000000', 'Inbox', 'Default board') \
              ON CONFLICT (name) DO NOTHING;
              INSERT INTO columns (id, board_id, name, position) VALUES \
                ('00000000-0000-0000-0000-000000000001', '00000000-0000-0000-0000-000000000000', 'Todo', 0), \
                ('00000000-0000-0000-0000-000000000002', '00000000-0000-0000-0000-000000000000', 'In Progress', 1), \
                ('00000000-0000-0000-0000-000000000003', '00000000-0000-0000-0000-000000000000', 'Done', 2) \
              ON CONFLICT (board_id, name) DO NOTHING;",
    }]
}

fn checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub async fn run_all(pool: &SqlitePool, force: bool) -> Result<(), StorageError> {
    for seed in all_seeds() {
        let already: Option<String> =
            sqlx::query_scalar("SELECT checksum FROM seed_status WHERE name = ?")
                .bind(seed.name)
                .fetch_optional(pool)
                .await?;
        if already.is_some() && !force {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in seed.sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT OR REPLACE INTO seed_status (name, checksum) VALUES (?, ?)")
            .bind(seed.name)
            .bind(checksum(seed.sql))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!("applied seed {}", seed.name);
    }
    Ok(())
}
