//! Integration test common infrastructure.
//!
//! Provides an application wired to an in-memory store and a recording
//! sender, plus builders for gateway events.

#![allow(dead_code)]

use async_trait::async_trait;
use cqbot::{App, AppOptions, MemoryStore, SendError, Sender};
use cqbot_proto::{ContextKind, Event};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// Bot account id used by every test app.
pub const SELF_ID: i64 = 514;

/// One message the app sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub kind: ContextKind,
    pub id: i64,
    pub text: String,
}

/// Records every outgoing message and gateway call.
#[derive(Default)]
pub struct MockSender {
    sent: Mutex<Vec<Sent>>,
    calls: Mutex<Vec<(String, Value)>>,
    replies: Mutex<HashMap<String, Value>>,
}

impl MockSender {
    /// Drains the recorded messages.
    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Drains the recorded texts.
    pub fn texts(&self) -> Vec<String> {
        self.take().into_iter().map(|s| s.text).collect()
    }

    /// Drains the recorded calls other than message sends.
    pub fn calls(&self) -> Vec<(String, Value)> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Answers future `action` calls with `data`.
    pub fn respond(&self, action: &str, data: Value) {
        self.replies.lock().insert(action.to_string(), data);
    }
}

#[async_trait]
impl Sender for MockSender {
    async fn call(&self, action: &str, params: Value) -> Result<Value, SendError> {
        let kind = match action {
            "send_private_msg" => Some((ContextKind::User, "user_id")),
            "send_group_msg" => Some((ContextKind::Group, "group_id")),
            "send_discuss_msg" => Some((ContextKind::Discuss, "discuss_id")),
            _ => None,
        };
        let Some((kind, key)) = kind else {
            self.calls.lock().push((action.to_string(), params));
            return Ok(self.replies.lock().get(action).cloned().unwrap_or(Value::Null));
        };

        let mut sent = self.sent.lock();
        sent.push(Sent {
            kind,
            id: params[key].as_i64().expect("conversation id"),
            text: params["message"].as_str().expect("message").to_string(),
        });
        Ok(json!({ "message_id": sent.len() }))
    }
}

/// An app plus handles on its collaborators.
pub struct TestApp {
    pub app: App,
    pub store: Arc<MemoryStore>,
    pub sender: Arc<MockSender>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(AppOptions {
            name: Some("Bot".to_string()),
            self_id: SELF_ID,
            default_authority: 1,
        })
    }

    pub fn with_options(options: AppOptions) -> Self {
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(MockSender::default());
        let app = App::new(options, store.clone(), sender.clone()).expect("app");
        Self { app, store, sender }
    }

    /// Dispatches a private message from `user`.
    pub async fn private(&self, user: i64, text: &str) {
        self.app.dispatch_event(private_message(user, text)).await;
    }

    /// Dispatches a group message from `user` in `group`.
    pub async fn group(&self, group: i64, user: i64, text: &str) {
        self.app.dispatch_event(group_message(group, user, text)).await;
    }
}

pub fn private_message(user: i64, text: &str) -> Event {
    Event::from_value(json!({
        "post_type": "message",
        "message_type": "private",
        "sub_type": "friend",
        "user_id": user,
        "message": text,
        "self_id": SELF_ID,
    }))
    .expect("private message")
}

pub fn group_message(group: i64, user: i64, text: &str) -> Event {
    Event::from_value(json!({
        "post_type": "message",
        "message_type": "group",
        "sub_type": "normal",
        "group_id": group,
        "user_id": user,
        "message": text,
        "self_id": SELF_ID,
    }))
    .expect("group message")
}

pub fn group_increase(group: i64, user: i64) -> Event {
    Event::from_value(json!({
        "post_type": "notice",
        "notice_type": "group_increase",
        "sub_type": "approve",
        "group_id": group,
        "user_id": user,
        "self_id": SELF_ID,
    }))
    .expect("group_increase notice")
}
