//! An in-flight event with its derived state.

use cqbot_proto::{ContextKind, Event, EventPath, MessageEvent, Target};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::observed::{ObservedRecord, Record};
use crate::app::{App, AppState};
use crate::error::HandlerError;
use crate::network::Sender;

/// One dispatched event plus everything resolved for it.
///
/// The observed user is owned by the session: it is loaded lazily by
/// [`Session::observe_user`] and flushed once when the middleware chain of
/// this event completes.
pub struct Session {
    app: Arc<AppState>,
    event: Event,
    path: EventPath,
    group: Option<Record>,
    user: Mutex<Option<ObservedRecord>>,
}

impl Session {
    pub(crate) fn new(app: Arc<AppState>, event: Event, group: Option<Record>) -> Self {
        let path = event.path();
        Self {
            app,
            event,
            path,
            group,
            user: Mutex::new(None),
        }
    }

    /// The application that received the event.
    pub fn app(&self) -> App {
        App::from_state(self.app.clone())
    }

    pub(crate) fn state(&self) -> &Arc<AppState> {
        &self.app
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn path(&self) -> &EventPath {
        &self.path
    }

    /// The conversation the event happened in.
    pub fn target(&self) -> Option<Target> {
        self.path.target
    }

    /// The message payload, for message events.
    pub fn message(&self) -> Option<&MessageEvent> {
        match &self.event {
            Event::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Message text, empty for other events.
    pub fn text(&self) -> &str {
        self.message().map_or("", |m| m.message.as_str())
    }

    pub fn user_id(&self) -> Option<i64> {
        self.event.user_id()
    }

    /// The group policy record, for group messages.
    pub fn group(&self) -> Option<&Record> {
        self.group.as_ref()
    }

    /// Where [`Session::send`] delivers.
    ///
    /// Messages reply in place; group notices and requests reply in the
    /// group, other notices and requests privately to the acting user.
    pub fn reply_target(&self) -> Option<Target> {
        match &self.event {
            Event::Message(message) => message.target(),
            Event::Notice(_) | Event::Request(_) => self.event.target().or_else(|| {
                self.user_id()
                    .map(|id| Target::new(ContextKind::User, id))
            }),
            Event::MetaEvent(_) | Event::Send(_) => None,
        }
    }

    /// Replies in the event's conversation.
    pub async fn send(&self, text: &str) -> Result<Option<i64>, HandlerError> {
        let target = self.reply_target().ok_or(HandlerError::NoReplyTarget)?;
        self.app.send_to(target, text).await
    }

    /// The outbound gateway; see [`crate::GatewayApi`] for typed actions.
    pub fn sender(&self) -> &Arc<dyn Sender> {
        self.app.sender()
    }

    /// Locks the observed user. `None` until [`Session::observe_user`]
    /// found or created a record.
    pub async fn user(&self) -> MutexGuard<'_, Option<ObservedRecord>> {
        self.user.lock().await
    }

    /// Ensures `fields` of the acting user are loaded.
    ///
    /// Only missing fields are fetched; fields already present (and any
    /// pending edits to them) are kept. Returns whether a user record is
    /// available.
    pub async fn observe_user(&self, fields: &[&str]) -> Result<bool, HandlerError> {
        let Some(user_id) = self.user_id() else {
            return Ok(false);
        };

        let mut guard = self.user.lock().await;
        let missing: Vec<&str> = match guard.as_ref() {
            Some(user) => fields.iter().copied().filter(|f| !user.has(f)).collect(),
            None => fields.to_vec(),
        };
        if guard.is_some() && missing.is_empty() {
            return Ok(true);
        }

        let fetched = self
            .app
            .store
            .get_user(user_id, self.app.options.default_authority, &missing)
            .await?;
        let Some(record) = fetched else {
            return Ok(guard.is_some());
        };
        match &mut *guard {
            Some(user) => user.merge(record),
            slot @ None => *slot = Some(ObservedRecord::new(user_id, record)),
        }
        Ok(true)
    }

    /// Persists the user's changed fields, if any.
    pub(crate) async fn flush_user(&self) -> Result<(), HandlerError> {
        let (id, diff) = match self.user.lock().await.as_mut() {
            Some(user) if user.is_dirty() => (user.id(), user.take_diff()),
            _ => return Ok(()),
        };
        debug!(user = id, fields = diff.len(), "Flushing user record");
        self.app.store.set_user(id, &diff).await?;
        Ok(())
    }
}
