//! Per-context event subscriptions.
//!
//! Every context owns one [`Receiver`]. The dispatcher emits each event's
//! progressive names (`message`, `message/normal`) on every receiver whose
//! context matches the event.

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use crate::error::HandlerResult;
use crate::state::Session;

/// A subscribed event handler.
pub type Listener = Arc<dyn Fn(Arc<Session>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Handle returned by [`Receiver::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    once: bool,
    listener: Listener,
}

/// Event subscriptions of one context.
#[derive(Default)]
pub struct Receiver {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<String, Vec<Entry>>>,
}

impl Receiver {
    fn subscribe<F, Fut>(&self, event: &str, once: bool, f: F) -> ListenerId
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener =
            Arc::new(move |session: Arc<Session>| -> BoxFuture<'static, HandlerResult> {
                Box::pin(f(session))
            });
        self.listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Entry { id, once, listener });
        id
    }

    /// Subscribes to `event` (e.g. `message`, `message/friend`, `group_increase`).
    pub fn on<F, Fut>(&self, event: &str, f: F) -> ListenerId
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.subscribe(event, false, f)
    }

    /// Subscribes to the next occurrence of `event` only.
    pub fn once<F, Fut>(&self, event: &str, f: F) -> ListenerId
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.subscribe(event, true, f)
    }

    /// Removes a subscription. Returns whether it existed.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        for entries in listeners.values_mut() {
            if let Some(index) = entries.iter().position(|e| e.id == id) {
                entries.remove(index);
                return true;
            }
        }
        false
    }

    /// Number of handlers subscribed to `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }

    /// Runs every handler of `event` in subscription order.
    ///
    /// Handler errors are logged and do not stop later handlers. Returns how
    /// many handlers ran.
    pub async fn emit(&self, event: &str, session: Arc<Session>) -> usize {
        let listeners: Vec<Listener> = {
            let mut map = self.listeners.write();
            let Some(entries) = map.get_mut(event) else {
                return 0;
            };
            let fired = entries.iter().map(|e| e.listener.clone()).collect();
            entries.retain(|e| !e.once);
            fired
        };

        for listener in &listeners {
            if let Err(e) = listener(session.clone()).await {
                warn!(event, error = %e, "Event listener failed");
                crate::metrics::record_handler_error(e.error_code());
            }
        }
        listeners.len()
    }
}
