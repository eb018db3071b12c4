use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("schema invalid: {0}")]
    SchemaInvalid(String),
    #[error("migration {id} checksum mismatch: expected {expected}, found {found}")]
    MigrationChecksumMismatch {
        id: String,
        expected: String,
        found: String,
    },
    #[error("migration {id} failed")]
    MigrationFailed { id: String, source: sqlx::Error },
}
