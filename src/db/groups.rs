//! Group repository.

use sqlx::SqlitePool;

use super::DbError;
use crate::state::Record;

/// Repository for group records.
pub struct GroupRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GroupRepository<'a> {
    /// Create a new group repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Load a group record.
    pub async fn find(&self, id: i64) -> Result<Option<Record>, DbError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM bot_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(|(data,)| serde_json::from_str(&data).map_err(DbError::from))
            .transpose()
    }

    /// Insert a new group record. An existing row is left untouched.
    pub async fn insert(&self, id: i64, record: &Record) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();
        let data = serde_json::to_string(record)?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO bot_groups (id, data, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(data)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Patch the given top-level fields.
    pub async fn update(&self, id: i64, diff: &Record) -> Result<bool, DbError> {
        super::patch(self.pool, "bot_groups", id, diff).await
    }
}
