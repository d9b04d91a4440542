//! User record fields, defaults and bookkeeping.

use chrono::{Local, NaiveDate};
use serde_json::Value;

use super::observed::{ObservedRecord, Record};

/// Field names of a user record.
pub mod fields {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const FLAG: &str = "flag";
    pub const AUTHORITY: &str = "authority";
    pub const IGNORE_END: &str = "ignore_end";
    pub const USAGE: &str = "usage";
    pub const TALKATIVENESS: &str = "talkativeness";

    /// Every field a user record carries.
    pub const ALL: [&str; 7] = [ID, NAME, FLAG, AUTHORITY, IGNORE_END, USAGE, TALKATIVENESS];
}

/// User flag bits.
pub mod flags {
    /// Ignore every message from this user.
    pub const IGNORE: i64 = 1;
}

/// Number of day buckets kept in `talkativeness`.
pub const ACTIVITY_DAYS: usize = 7;

/// The record created for a user seen for the first time.
pub fn default_user(id: i64, authority: i64) -> Record {
    let mut record = Record::new();
    record.insert(fields::ID.into(), id.into());
    record.insert(fields::NAME.into(), id.to_string().into());
    record.insert(fields::FLAG.into(), 0.into());
    record.insert(fields::AUTHORITY.into(), authority.into());
    record.insert(fields::IGNORE_END.into(), 0.into());
    record.insert(fields::USAGE.into(), Value::Object(Record::new()));
    record.insert(fields::TALKATIVENESS.into(), Value::Object(Record::new()));
    record
}

/// Keeps only `fields` of `record` (plus `id`). An empty slice keeps all.
pub fn project(record: &Record, wanted: &[&str]) -> Record {
    if wanted.is_empty() {
        return record.clone();
    }
    record
        .iter()
        .filter(|(key, _)| key.as_str() == fields::ID || wanted.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Today's calendar date as a usage day key (`YYYY-MM-DD`).
pub fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Days since the Unix epoch in local time, used as the activity bucket key.
pub fn day_number() -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    Local::now()
        .date_naive()
        .signed_duration_since(epoch)
        .num_days()
}

/// Usage bookkeeping for one command on one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub count: i64,
    pub last: i64,
}

/// Loads `usage[key]`, resetting the count when the stored day is not
/// `today`.
pub fn update_usage(user: &mut ObservedRecord, key: &str, today: &str) -> Usage {
    let mut usage = user.view(fields::USAGE);
    let mut entry = usage.view(key);
    if entry.get_str("date") != Some(today) {
        entry.set("date", today);
        entry.set("count", 0);
    }
    Usage {
        count: entry.get_i64("count").unwrap_or(0),
        last: entry.get_i64("last").unwrap_or(0),
    }
}

/// Bumps `talkativeness[day][group]`, keeping only the most recent
/// [`ACTIVITY_DAYS`] day buckets.
pub fn update_activity(user: &mut ObservedRecord, group_id: i64, day: i64) {
    let mut activity = user.view(fields::TALKATIVENESS);
    let day_key = day.to_string();
    if activity.get(&day_key).is_none() {
        activity.view(&day_key);
        let mut days: Vec<i64> = activity
            .keys()
            .iter()
            .filter_map(|k| k.parse().ok())
            .collect();
        days.sort_unstable();
        if days.len() > ACTIVITY_DAYS {
            let cutoff = days[days.len() - ACTIVITY_DAYS];
            activity.retain(|k, _| k.parse::<i64>().map_or(true, |d| d >= cutoff));
        }
    }
    activity.view(&day_key).increment(&group_id.to_string(), 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_user() {
        let user = default_user(10000, 1);
        assert_eq!(user["id"], 10000);
        assert_eq!(user["name"], "10000");
        assert_eq!(user["authority"], 1);
        assert_eq!(user["flag"], 0);
        assert!(user["usage"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_project() {
        let user = default_user(7, 2);
        let projected = project(&user, &["authority"]);
        assert_eq!(projected.len(), 2);
        assert_eq!(projected["authority"], 2);
        assert_eq!(project(&user, &[]).len(), fields::ALL.len());
    }

    #[test]
    fn test_usage_resets_on_new_day() {
        let mut user = ObservedRecord::new(1, default_user(1, 1));
        user.set("usage.echo", json!({"date": "2000-01-01", "count": 5, "last": 42}));
        user.take_diff();

        let usage = update_usage(&mut user, "echo", "2000-01-02");
        assert_eq!(usage, Usage { count: 0, last: 42 });
        assert_eq!(user.get_str("usage.echo.date"), Some("2000-01-02"));
        assert!(user.is_dirty());

        user.set("usage.echo.count", 3);
        let usage = update_usage(&mut user, "echo", "2000-01-02");
        assert_eq!(usage.count, 3);
    }

    #[test]
    fn test_activity_keeps_seven_days() {
        let mut user = ObservedRecord::new(1, default_user(1, 1));
        for day in 100..110 {
            update_activity(&mut user, 5, day);
        }
        update_activity(&mut user, 5, 109);
        update_activity(&mut user, 6, 109);

        let days = user.view(fields::TALKATIVENESS).keys();
        assert_eq!(days.len(), ACTIVITY_DAYS);
        assert!(!days.contains(&"102".to_string()));
        assert_eq!(user.get_i64("talkativeness.109.5"), Some(2));
        assert_eq!(user.get_i64("talkativeness.109.6"), Some(1));
    }

    #[test]
    fn test_today_format() {
        let day = today();
        assert_eq!(day.len(), 10);
        assert!(NaiveDate::parse_from_str(&day, "%Y-%m-%d").is_ok());
        assert!(day_number() > 19000);
    }
}
