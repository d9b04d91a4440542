//! Group policy records.

use super::observed::Record;

/// Field names of a group record.
pub mod fields {
    pub const ID: &str = "id";
    pub const FLAG: &str = "flag";
    pub const ASSIGNEE: &str = "assignee";

    /// Every field a group record carries.
    pub const ALL: [&str; 3] = [ID, FLAG, ASSIGNEE];
}

/// Group flag bits.
pub mod flags {
    /// Commands are not executed in this group.
    pub const NO_COMMAND: i64 = 1;
    /// The bot only reacts when explicitly mentioned.
    pub const NO_RESPONSE: i64 = 2;
}

/// The record created for a group seen for the first time.
///
/// Without a known assignee the group starts muted.
pub fn default_group(id: i64, assignee: i64) -> Record {
    let flag = if assignee != 0 {
        0
    } else {
        flags::NO_COMMAND | flags::NO_RESPONSE
    };
    let mut record = Record::new();
    record.insert(fields::ID.into(), id.into());
    record.insert(fields::FLAG.into(), flag.into());
    record.insert(fields::ASSIGNEE.into(), assignee.into());
    record
}

/// Read-only accessors over a group record.
pub trait GroupRecordExt {
    fn flag(&self) -> i64;
    fn assignee(&self) -> i64;
}

impl GroupRecordExt for Record {
    fn flag(&self) -> i64 {
        self.get(fields::FLAG).and_then(|v| v.as_i64()).unwrap_or(0)
    }

    fn assignee(&self) -> i64 {
        self.get(fields::ASSIGNEE)
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }
}
