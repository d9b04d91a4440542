//! Database module for persistent storage.
//!
//! Provides the [`Store`] interface the runtime reads user and group
//! records through, with two implementations:
//! - [`Database`]: async SQLite via SQLx, records kept as JSON documents
//! - [`MemoryStore`]: process-local maps, for tests and database-less runs

mod groups;
mod memory;
mod store;
mod users;

pub use groups::GroupRepository;
pub use memory::MemoryStore;
pub use store::Store;
pub use users::UserRepository;

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::state::{Record, default_group, default_user, project};

/// Distinguishes in-memory databases opened by one process.
static MEMORY_DATABASES: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
    #[error("corrupt record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid field name: {0:?}")]
    InvalidField(String),
}

/// SQLite-backed record store.
///
/// Users and groups are single rows holding a JSON document; updates patch
/// top-level fields in place. Group records are cached for
/// [`Database::GROUP_CACHE_TTL`] since every group message reads one.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    group_cache: Arc<DashMap<i64, (Instant, Record)>>,
}

impl Database {
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// How long a fetched group record is served from memory.
    pub const GROUP_CACHE_TTL: Duration = Duration::from_secs(60);

    /// Opens (or creates) the database at `path` and applies migrations.
    ///
    /// `:memory:` opens a private in-memory database.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let (options, max_connections) = if path == ":memory:" {
            let n = MEMORY_DATABASES.fetch_add(1, Ordering::Relaxed);
            let uri = format!("file:cqbot-{}-{}?mode=memory&cache=shared", std::process::id(), n);
            (SqliteConnectOptions::new().filename(&uri).shared_cache(true), 1)
        } else {
            if let Some(dir) = Path::new(path).parent()
                && !dir.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(dir)
            {
                warn!(dir = %dir.display(), error = %e, "Cannot create database directory");
            }
            (SqliteConnectOptions::new().filename(path), 5)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout(Some(Self::IDLE_TIMEOUT))
            .connect_with(options.create_if_missing(true))
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            sqlx::query(pragma).execute(&pool).await?;
        }
        info!(path, "Record store opened");

        Ok(Self {
            pool,
            group_cache: Arc::new(DashMap::new()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool)
    }

    pub fn groups(&self) -> GroupRepository<'_> {
        GroupRepository::new(&self.pool)
    }
}

/// Patches top-level fields of a JSON document row with `json_set`.
async fn patch(pool: &SqlitePool, table: &str, id: i64, diff: &Record) -> Result<bool, DbError> {
    if diff.is_empty() {
        return Ok(false);
    }

    let mut sql = format!("UPDATE {table} SET data = json_set(data");
    for key in diff.keys() {
        store::validate_field(key)?;
        sql.push_str(", ?, json(?)");
    }
    sql.push_str("), updated_at = ? WHERE id = ?");

    let mut query = sqlx::query(&sql);
    for (key, value) in diff {
        query = query
            .bind(format!("$.{key}"))
            .bind(serde_json::to_string(value)?);
    }
    let result = query
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl Store for Database {
    async fn get_user(
        &self,
        id: i64,
        default_authority: i64,
        fields: &[&str],
    ) -> Result<Option<Record>, DbError> {
        let users = self.users();
        if let Some(record) = users.find(id).await? {
            return Ok(Some(project(&record, fields)));
        }
        if default_authority < 0 {
            return Ok(None);
        }

        let record = default_user(id, default_authority);
        users.insert(id, &record).await?;
        debug!(user = id, authority = default_authority, "Created user record");
        Ok(Some(project(&record, fields)))
    }

    async fn set_user(&self, id: i64, diff: &Record) -> Result<(), DbError> {
        self.users().update(id, diff).await?;
        Ok(())
    }

    async fn get_group(&self, id: i64, self_id: i64, fields: &[&str]) -> Result<Record, DbError> {
        if let Some(entry) = self.group_cache.get(&id)
            && entry.0.elapsed() < Self::GROUP_CACHE_TTL
        {
            return Ok(project(&entry.1, fields));
        }

        let groups = self.groups();
        let record = match groups.find(id).await? {
            Some(record) => record,
            None => {
                let record = default_group(id, self_id);
                if self_id == 0 || id == 0 {
                    return Ok(project(&record, fields));
                }
                groups.insert(id, &record).await?;
                debug!(group = id, assignee = self_id, "Created group record");
                record
            }
        };

        self.group_cache
            .insert(id, (Instant::now(), record.clone()));
        Ok(project(&record, fields))
    }

    async fn set_group(&self, id: i64, diff: &Record) -> Result<(), DbError> {
        self.groups().update(id, diff).await?;
        self.group_cache.remove(&id);
        Ok(())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GroupRecordExt;
    use serde_json::json;

    fn diff(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_user_creation_semantics() {
        let db = Database::new(":memory:").await.unwrap();

        assert!(db.get_user(1, -1, &[]).await.unwrap().is_none());
        assert_eq!(db.users().count().await.unwrap(), 0);

        let user = db.get_user(1, 2, &["authority"]).await.unwrap().unwrap();
        assert_eq!(user["authority"], 2);
        assert_eq!(user.len(), 2);

        // existing rows are returned even with a negative default
        let user = db.get_user(1, -1, &[]).await.unwrap().unwrap();
        assert_eq!(user["name"], "1");
        assert_eq!(db.users().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_user_patch() {
        let db = Database::new(":memory:").await.unwrap();
        db.get_user(7, 1, &[]).await.unwrap();

        db.set_user(7, &diff(json!({"authority": 4, "usage": {"echo": {"count": 2}}})))
            .await
            .unwrap();

        let user = db.get_user(7, 1, &[]).await.unwrap().unwrap();
        assert_eq!(user["authority"], 4);
        assert_eq!(user["usage"]["echo"]["count"], 2);
        assert_eq!(user["flag"], 0);
    }

    #[tokio::test]
    async fn test_patch_rejects_bad_field() {
        let db = Database::new(":memory:").await.unwrap();
        db.get_user(7, 1, &[]).await.unwrap();
        let err = db
            .set_user(7, &diff(json!({"a.b": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidField(_)));
    }

    #[tokio::test]
    async fn test_group_defaults_and_cache() {
        let db = Database::new(":memory:").await.unwrap();

        // unknown self id: default returned, nothing persisted
        let group = db.get_group(100, 0, &[]).await.unwrap();
        assert_eq!(group.flag(), 3);
        assert!(db.groups().find(100).await.unwrap().is_none());

        let group = db.get_group(100, 514, &[]).await.unwrap();
        assert_eq!(group.flag(), 0);
        assert_eq!(group.assignee(), 514);
        assert!(db.groups().find(100).await.unwrap().is_some());

        db.set_group(100, &diff(json!({"flag": 2}))).await.unwrap();
        let group = db.get_group(100, 514, &["flag"]).await.unwrap();
        assert_eq!(group.flag(), 2);
    }
}
