//! In-memory [`Store`] for tests and runs without a database.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{DbError, Store};
use crate::state::{Record, default_group, default_user, project};

/// Keeps user and group records in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<i64, Record>,
    groups: DashMap<i64, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored user.
    pub fn user(&self, id: i64) -> Option<Record> {
        self.users.get(&id).map(|r| r.clone())
    }

    /// Snapshot of a stored group.
    pub fn group(&self, id: i64) -> Option<Record> {
        self.groups.get(&id).map(|r| r.clone())
    }

    /// Replaces a user record wholesale.
    pub fn insert_user(&self, id: i64, record: Record) {
        self.users.insert(id, record);
    }

    /// Replaces a group record wholesale.
    pub fn insert_group(&self, id: i64, record: Record) {
        self.groups.insert(id, record);
    }
}

fn apply(target: &mut Record, diff: &Record) {
    for (key, value) in diff {
        target.insert(key.clone(), value.clone());
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(
        &self,
        id: i64,
        default_authority: i64,
        fields: &[&str],
    ) -> Result<Option<Record>, DbError> {
        if let Some(record) = self.users.get(&id) {
            return Ok(Some(project(&record, fields)));
        }
        if default_authority < 0 {
            return Ok(None);
        }
        let record = self
            .users
            .entry(id)
            .or_insert_with(|| default_user(id, default_authority));
        Ok(Some(project(&record, fields)))
    }

    async fn set_user(&self, id: i64, diff: &Record) -> Result<(), DbError> {
        if let Some(mut record) = self.users.get_mut(&id) {
            apply(&mut record, diff);
        }
        Ok(())
    }

    async fn get_group(&self, id: i64, self_id: i64, fields: &[&str]) -> Result<Record, DbError> {
        if let Some(record) = self.groups.get(&id) {
            return Ok(project(&record, fields));
        }
        let record = default_group(id, self_id);
        if self_id != 0 && id != 0 {
            self.groups.insert(id, record.clone());
        }
        Ok(project(&record, fields))
    }

    async fn set_group(&self, id: i64, diff: &Record) -> Result<(), DbError> {
        if let Some(mut record) = self.groups.get_mut(&id) {
            apply(&mut record, diff);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_negative_authority_never_creates() {
        let store = MemoryStore::new();
        assert!(store.get_user(1, -1, &[]).await.unwrap().is_none());
        assert!(store.user(1).is_none());

        store.get_user(1, 0, &[]).await.unwrap();
        assert_eq!(store.user(1).unwrap()["authority"], 0);
    }

    #[tokio::test]
    async fn test_set_user_merges_fields() {
        let store = MemoryStore::new();
        store.get_user(3, 1, &[]).await.unwrap();
        let diff = json!({"authority": 3}).as_object().cloned().unwrap();
        store.set_user(3, &diff).await.unwrap();

        let user = store.get_user(3, 1, &["authority", "flag"]).await.unwrap().unwrap();
        assert_eq!(user["authority"], 3);
        assert_eq!(user["flag"], 0);
        assert!(!user.contains_key("usage"));
    }

    #[tokio::test]
    async fn test_group_persisted_only_with_ids() {
        let store = MemoryStore::new();
        store.get_group(5, 0, &[]).await.unwrap();
        assert!(store.group(5).is_none());
        store.get_group(5, 9, &[]).await.unwrap();
        assert!(store.group(5).is_some());
    }
}
