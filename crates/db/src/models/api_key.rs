use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub key_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

const SELECT_KEY_COLUMNS: &str = "id, key_hash, name, created_at, last_used_at, expires_at";

/// Hex-encoded HMAC-SHA256 of the raw key, keyed by the server's configured
/// secret. The raw key is never stored; a leaked database dump alone (without
/// the secret) can't be turned back into a usable credential or replayed
/// against a differently-keyed deployment.
fn hash_key(secret: &str, raw_key: &str) -> Result<String, sqlx::Error> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    mac.update(raw_key.as_bytes());
    Ok(format!("{:x}", mac.finalize().into_bytes()))
}

impl ApiKeyRecord {
    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        raw_key: &str,
        secret: &str,
        name: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let hash = hash_key(secret, raw_key)?;
        sqlx::query_as::<_, ApiKeyRecord>(&format!(
            "INSERT INTO api_keys (id, key_hash, name, expires_at) VALUES (?, ?, ?, ?) \
             RETURNING {SELECT_KEY_COLUMNS}"
        ))
        .bind(id)
        .bind(hash)
        .bind(name)
        .bind(expires_at)
        .fetch_one(executor)
        .await
    }

    /// Recomputes the keyed digest for `raw_key`, then checks it against every
    /// live (non-expired) row's stored digest with a constant-time MAC
    /// comparison (`Mac::verify_slice`) rather than a SQL equality lookup, so
    /// the match doesn't leak timing information about the stored hash.
    pub async fn authenticate(pool: &SqlitePool, secret: &str, raw_key: &str) -> Result<Option<Self>, sqlx::Error> {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        mac.update(raw_key.as_bytes());

        let candidates = sqlx::query_as::<_, ApiKeyRecord>(&format!(
            "SELECT {SELECT_KEY_COLUMNS} FROM api_keys \
             WHERE expires_at IS NULL OR expires_at > datetime('now')"
        ))
        .fetch_all(pool)
        .await?;

        for candidate in candidates {
            let Ok(stored) = hex_decode(&candidate.key_hash) else { continue };
            if mac.clone().verify_slice(&stored).is_ok() {
                return sqlx::query_as::<_, ApiKeyRecord>(&format!(
                    "UPDATE api_keys SET last_used_at = datetime('now', 'subsec') \
                     WHERE id = ? RETURNING {SELECT_KEY_COLUMNS}"
                ))
                .bind(candidate.id)
                .fetch_optional(pool)
                .await;
            }
        }
        Ok(None)
    }

    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, ApiKeyRecord>(&format!(
            "SELECT {SELECT_KEY_COLUMNS} FROM api_keys ORDER BY created_at"
        ))
        .fetch_all(executor)
        .await
    }

    pub async fn revoke<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

fn hex_decode(text: &str) -> Result<Vec<u8>, ()> {
    if text.len() % 2 != 0 {
        return Err(());
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_decode_round_trips_a_hash_key_digest() {
        let secret = "shh";
        let digest = hash_key(secret, "raw-key").expect("hmac of any length key succeeds");
        let decoded = hex_decode(&digest).expect("even-length hex decodes");
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn hash_key_differs_by_secret() {
        let a = hash_key("secret-a", "raw-key").expect("hmac succeeds");
        let b = hash_key("secret-b", "raw-key").expect("hmac succeeds");
        assert_ne!(a, b);
    }
}
