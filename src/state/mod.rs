//! Per-event and persisted state.
//!
//! - [`observed`]: change-tracking wrapper over JSON records
//! - [`user`] / [`group`]: record fields, defaults and bookkeeping
//! - [`session`]: an in-flight event with its resolved records

mod observed;
mod session;

pub mod group;
pub mod user;

pub use group::{GroupRecordExt, default_group};
pub use observed::{FieldView, ObservedRecord, Record};
pub use session::Session;
pub use user::{Usage, day_number, default_user, project, today, update_activity, update_usage};
