//! Change-tracking wrapper around user and group records.
//!
//! Records are JSON objects. Every write made through [`ObservedRecord`] or
//! a nested [`FieldView`] marks the top-level field it touched as dirty;
//! [`ObservedRecord::take_diff`] hands back the current values of exactly
//! those fields so the store only persists what changed.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A stored record: a JSON object keyed by field name.
pub type Record = Map<String, Value>;

/// A record plus the set of top-level fields changed since the last flush.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedRecord {
    id: i64,
    data: Record,
    dirty: BTreeSet<String>,
}

impl ObservedRecord {
    /// Wraps `data` with a clean dirty set.
    pub fn new(id: i64, data: Record) -> Self {
        Self {
            id,
            data,
            dirty: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// The wrapped record.
    pub fn data(&self) -> &Record {
        &self.data
    }

    /// Whether `field` has been loaded.
    pub fn has(&self, field: &str) -> bool {
        self.data.contains_key(field)
    }

    /// Reads a value by dotted path (`usage.echo.count`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.data.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Reads an integer by dotted path. Floats are truncated.
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        as_i64(self.get(path)?)
    }

    /// Reads a string by dotted path.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    /// Writes a value by dotted path, creating intermediate objects.
    ///
    /// Returns whether anything changed. Writing an identical value leaves
    /// the record clean.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        match path.split_once('.') {
            None => {
                if self.data.get(path) == Some(&value) {
                    return false;
                }
                self.data.insert(path.to_owned(), value);
                self.dirty.insert(path.to_owned());
                true
            }
            Some((field, rest)) => {
                let mut view = self.view(field);
                let mut parts: Vec<&str> = rest.split('.').collect();
                let Some(last) = parts.pop() else {
                    return false;
                };
                for part in parts {
                    view = view.into_view(part);
                }
                view.set(last, value)
            }
        }
    }

    /// Removes a top-level field.
    ///
    /// A removed field is no longer part of the next diff.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.dirty.remove(field);
        self.data.remove(field)
    }

    /// Opens a nested view on a top-level field, turning it into an object
    /// when it is missing or holds a scalar.
    pub fn view(&mut self, field: &str) -> FieldView<'_> {
        let value = self.data.entry(field.to_owned()).or_insert(Value::Null);
        if !value.is_object() {
            *value = Value::Object(Map::new());
            self.dirty.insert(field.to_owned());
        }
        FieldView {
            field: field.to_owned(),
            value,
            dirty: &mut self.dirty,
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Top-level fields changed since the last flush.
    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Returns the current values of every dirty field and clears the set.
    pub fn take_diff(&mut self) -> Record {
        let mut diff = Record::new();
        for field in std::mem::take(&mut self.dirty) {
            if let Some(value) = self.data.get(&field) {
                diff.insert(field, value.clone());
            }
        }
        diff
    }

    /// Adds freshly loaded fields without marking them dirty.
    ///
    /// Fields already present are kept, so pending local edits survive.
    pub fn merge(&mut self, fields: Record) {
        for (key, value) in fields {
            self.data.entry(key).or_insert(value);
        }
    }
}

/// A mutable window onto a nested object inside an [`ObservedRecord`].
///
/// Writes through the view mark the owning top-level field dirty.
pub struct FieldView<'a> {
    field: String,
    value: &'a mut Value,
    dirty: &'a mut BTreeSet<String>,
}

impl<'a> FieldView<'a> {
    fn touch(&mut self) {
        self.dirty.insert(self.field.clone());
    }

    fn ensure_object(&mut self) {
        if !self.value.is_object() {
            *self.value = Value::Object(Map::new());
            self.dirty.insert(self.field.clone());
        }
    }

    /// Makes `key` hold an object; returns whether it had to be created.
    fn ensure_child(&mut self, key: &str) -> bool {
        self.ensure_object();
        let Some(map) = self.value.as_object_mut() else {
            return false;
        };
        let child = map.entry(key.to_owned()).or_insert(Value::Null);
        if child.is_object() {
            return false;
        }
        *child = Value::Object(Map::new());
        self.touch();
        true
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        as_i64(self.get(key)?)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Keys of the viewed object, in order.
    pub fn keys(&self) -> Vec<String> {
        self.value
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Writes `key`; returns whether anything changed.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        if self.value.get(key) == Some(&value) {
            return false;
        }
        self.ensure_object();
        if let Some(map) = self.value.as_object_mut() {
            map.insert(key.to_owned(), value);
        }
        self.touch();
        true
    }

    /// Removes `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.value.as_object_mut().and_then(|map| map.remove(key));
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        let Some(map) = self.value.as_object_mut() else {
            return;
        };
        let before = map.len();
        map.retain(|k, v| keep(k, v));
        if map.len() != before {
            self.touch();
        }
    }

    /// Adds `delta` to the integer at `key` (missing counts as 0).
    pub fn increment(&mut self, key: &str, delta: i64) -> i64 {
        let next = self.get_i64(key).unwrap_or(0) + delta;
        self.set(key, next);
        next
    }

    /// Opens a nested view on `key`, creating an empty object when needed.
    pub fn view(&mut self, key: &str) -> FieldView<'_> {
        self.ensure_child(key);
        FieldView {
            field: self.field.clone(),
            value: &mut self.value[key],
            dirty: &mut *self.dirty,
        }
    }

    /// Like [`FieldView::view`], consuming this view.
    pub fn into_view(mut self, key: &str) -> FieldView<'a> {
        self.ensure_child(key);
        let FieldView {
            field,
            value,
            dirty,
        } = self;
        FieldView {
            field,
            value: &mut value[key],
            dirty,
        }
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_reads_do_not_dirty() {
        let mut user = ObservedRecord::new(1, record(json!({"a": 1, "b": {"c": 2}})));
        assert_eq!(user.get_i64("a"), Some(1));
        assert_eq!(user.get_i64("b.c"), Some(2));
        assert!(user.get("b.d").is_none());
        assert!(!user.is_dirty());
        assert!(user.take_diff().is_empty());
    }

    #[test]
    fn test_set_same_value_is_clean() {
        let mut user = ObservedRecord::new(1, record(json!({"a": 1})));
        assert!(!user.set("a", 1));
        assert!(!user.is_dirty());
        assert!(user.set("a", 2));
        assert_eq!(user.take_diff(), record(json!({"a": 2})));
        assert!(!user.is_dirty());
    }

    #[test]
    fn test_nested_mutation_marks_top_level_field() {
        let mut user = ObservedRecord::new(1, record(json!({"a": 1, "b": {"c": 2}})));
        user.view("b").set("c", 3);
        let diff = user.take_diff();
        assert_eq!(diff, record(json!({"b": {"c": 3}})));
    }

    #[test]
    fn test_dotted_set_creates_objects() {
        let mut user = ObservedRecord::new(1, Record::new());
        assert!(user.set("usage.echo.count", 1));
        assert_eq!(user.get_i64("usage.echo.count"), Some(1));
        assert_eq!(user.dirty_fields().collect::<Vec<_>>(), vec!["usage"]);
    }

    #[test]
    fn test_remove_clears_dirty() {
        let mut user = ObservedRecord::new(1, record(json!({"a": 1})));
        user.set("a", 5);
        user.set("b", 6);
        assert_eq!(user.remove("a"), Some(json!(5)));
        assert_eq!(user.take_diff(), record(json!({"b": 6})));
    }

    #[test]
    fn test_merge_keeps_local_edits() {
        let mut user = ObservedRecord::new(1, record(json!({"a": 1})));
        user.set("a", 2);
        user.merge(record(json!({"a": 1, "b": 3})));
        assert_eq!(user.get_i64("a"), Some(2));
        assert_eq!(user.get_i64("b"), Some(3));
        assert_eq!(user.dirty_fields().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_view_retain_and_increment() {
        let mut user = ObservedRecord::new(1, record(json!({"t": {"1": {}, "2": {}, "3": {}}})));
        user.view("t").retain(|k, _| k != "1");
        assert_eq!(user.view("t").keys(), vec!["2", "3"]);
        assert_eq!(user.view("t").view("3").increment("g", 1), 1);
        assert_eq!(user.view("t").view("3").increment("g", 1), 2);
        assert_eq!(user.take_diff(), record(json!({"t": {"2": {}, "3": {"g": 2}}})));
    }
}
