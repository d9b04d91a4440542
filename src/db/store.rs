//! The persistence interface the runtime depends on.

use async_trait::async_trait;

use super::DbError;
use crate::state::Record;

/// Reads and patches user and group records.
///
/// `fields` selects which top-level fields to return; an empty slice
/// returns the whole record. `id` is always included.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetches a user, creating it with `default_authority` when missing.
    ///
    /// A negative `default_authority` never creates a record and yields
    /// `None` for unknown users.
    async fn get_user(
        &self,
        id: i64,
        default_authority: i64,
        fields: &[&str],
    ) -> Result<Option<Record>, DbError>;

    /// Writes the given top-level fields of a user.
    async fn set_user(&self, id: i64, diff: &Record) -> Result<(), DbError>;

    /// Fetches a group, or its default when missing.
    ///
    /// The default is persisted only when both `self_id` and `id` are
    /// non-zero.
    async fn get_group(&self, id: i64, self_id: i64, fields: &[&str]) -> Result<Record, DbError>;

    /// Writes the given top-level fields of a group.
    async fn set_group(&self, id: i64, diff: &Record) -> Result<(), DbError>;
}

/// Checks that `key` can be used as a JSON path segment.
pub(super) fn validate_field(key: &str) -> Result<(), DbError> {
    let mut chars = key.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidField(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_field() {
        assert!(validate_field("authority").is_ok());
        assert!(validate_field("ignore_end").is_ok());
        assert!(validate_field("_x1").is_ok());
        assert!(validate_field("").is_err());
        assert!(validate_field("a.b").is_err());
        assert!(validate_field("1abc").is_err());
        assert!(validate_field("x'; DROP").is_err());
    }
}
