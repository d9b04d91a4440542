//! The application composition root.
//!
//! [`AppState`] owns every registry, the store, the outbound sender and the
//! pipeline bookkeeping. [`App`] is the user-facing handle: a clonable root
//! [`Context`] covering every conversation, plus dispatch entry points.

use cqbot_proto::{Event, ScopeSet, SendEvent, Target};
use parking_lot::RwLock;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::db::Store;
use crate::error::{HandlerError, PipelineWarning, RegistrationError};
use crate::handlers::Context;
use crate::handlers::command::help;
use crate::handlers::core::middleware::{PipelineState, Role, middleware_fn};
use crate::handlers::core::registry::{Position, Registry};
use crate::handlers::preprocess::{Prefixes, preprocess};
use crate::network::{Sender, dispatch_event};

/// Bot identity and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOptions {
    /// Name users may address the bot by.
    pub name: Option<String>,
    /// Bot account id; `0` adopts the id reported by the first event.
    pub self_id: i64,
    /// Authority of newly created users. Negative never creates users.
    pub default_authority: i64,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            name: None,
            self_id: 0,
            default_authority: 1,
        }
    }
}

impl From<&crate::config::Config> for AppOptions {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            name: config.bot.name.clone(),
            self_id: config.bot.self_id,
            default_authority: config.bot.default_authority,
        }
    }
}

/// Shared state of one application.
pub struct AppState {
    pub(crate) options: AppOptions,
    self_id: AtomicI64,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) store: Arc<dyn Store>,
    sender: Arc<dyn Sender>,
    pub(crate) pipeline: PipelineState,
    prefixes: RwLock<Arc<Prefixes>>,
}

impl AppState {
    pub(crate) fn self_id(&self) -> i64 {
        self.self_id.load(Ordering::Relaxed)
    }

    /// Records the bot id and rebuilds the addressing prefixes for it.
    pub(crate) fn set_self_id(&self, self_id: i64) -> Result<(), RegistrationError> {
        let prefixes = Prefixes::new(self.options.name.as_deref(), self_id)?;
        *self.prefixes.write() = Arc::new(prefixes);
        self.self_id.store(self_id, Ordering::Relaxed);
        info!(self_id, "Bot id set");
        Ok(())
    }

    pub(crate) fn sender(&self) -> &Arc<dyn Sender> {
        &self.sender
    }

    pub(crate) fn prefixes(&self) -> Arc<Prefixes> {
        self.prefixes.read().clone()
    }

    /// Sends `text` to `target`, then dispatches the matching `send` event.
    pub(crate) async fn send_to(
        self: &Arc<Self>,
        target: Target,
        text: &str,
    ) -> Result<Option<i64>, HandlerError> {
        if text.is_empty() {
            return Ok(None);
        }
        let message_id = self.sender.send(target.kind, target.id, text).await?;
        crate::metrics::record_message_sent(target.kind.as_str());
        debug!(target = %target, ?message_id, "Message sent");

        let event = Event::Send(SendEvent {
            send_type: target.kind,
            target_id: target.id,
            message_id,
            message: text.to_string(),
            self_id: self.self_id(),
        });
        dispatch_event(self.clone(), event).await;
        Ok(message_id)
    }
}

/// A running bot application.
///
/// Dereferences to the root [`Context`], so commands and middleware can be
/// registered on it directly.
#[derive(Clone)]
pub struct App {
    root: Context,
}

impl App {
    /// Creates an application with the built-in preprocessor and `help`
    /// command installed.
    pub fn new(
        options: AppOptions,
        store: Arc<dyn Store>,
        sender: Arc<dyn Sender>,
    ) -> Result<Self, RegistrationError> {
        let prefixes = Prefixes::new(options.name.as_deref(), options.self_id)?;
        let state = Arc::new(AppState {
            self_id: AtomicI64::new(options.self_id),
            options,
            registry: RwLock::new(Registry::default()),
            store,
            sender,
            pipeline: PipelineState::default(),
            prefixes: RwLock::new(Arc::new(prefixes)),
        });
        state.registry.write().add_middleware(
            ScopeSet::all(),
            middleware_fn(preprocess),
            Position::Append,
            Role::Preprocessor,
        );

        let app = Self::from_state(state);
        help::install(&app.root)?;
        Ok(app)
    }

    pub(crate) fn from_state(state: Arc<AppState>) -> Self {
        Self {
            root: Context::for_scope(&state, ScopeSet::all()),
        }
    }

    /// Decodes and dispatches one raw gateway event.
    pub async fn dispatch(&self, raw: &[u8]) -> Result<(), cqbot_proto::ProtocolError> {
        let event = Event::from_slice(raw)?;
        self.dispatch_event(event).await;
        Ok(())
    }

    /// Dispatches a decoded event; resolves once every listener and the
    /// middleware chain are done.
    pub async fn dispatch_event(&self, event: Event) {
        dispatch_event(self.root.state().clone(), event).await;
    }

    /// Sends `text` to a conversation.
    pub async fn send(&self, target: Target, text: &str) -> Result<Option<i64>, HandlerError> {
        self.root.state().send_to(target, text).await
    }

    /// Subscribes to pipeline integrity warnings.
    pub fn subscribe_warnings(&self) -> broadcast::Receiver<PipelineWarning> {
        self.root.state().pipeline.subscribe()
    }

    pub fn options(&self) -> &AppOptions {
        &self.root.state().options
    }

    /// The bot's account id, `0` while unknown.
    pub fn self_id(&self) -> i64 {
        self.root.state().self_id()
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.root.state().store
    }

    /// The outbound gateway, for API calls beyond plain sends.
    pub fn sender(&self) -> &Arc<dyn Sender> {
        self.root.state().sender()
    }

    /// Removes every registered middleware except the built-in
    /// preprocessor.
    pub fn clear_middleware(&self) {
        self.root.state().registry.write().clear_middleware();
    }
}

impl Deref for App {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.root
    }
}
