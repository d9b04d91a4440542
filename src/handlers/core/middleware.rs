//! The middleware pipeline.
//!
//! Each message event runs through the scope-filtered snapshot of the
//! application's middleware list. A middleware receives the [`Session`] and
//! a [`Next`] continuation; the chain only advances when a middleware calls
//! [`Next::run`] or [`Next::fallback`].
//!
//! Every run gets an id from a counter. While the run is executing its id is
//! in the live set; a continuation used after that is reported as an
//! isolated `next` and does nothing.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tracing::{error, warn};

use cqbot_proto::ScopeSet;

use crate::app::AppState;
use crate::error::{HandlerResult, PipelineWarning};
use crate::state::Session;

/// A middleware handler.
pub type Middleware = Arc<dyn Fn(Arc<Session>, Next) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Boxes a closure into a [`Middleware`].
pub(crate) fn middleware_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Arc<Session>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(
        move |session: Arc<Session>, next: Next| -> BoxFuture<'static, HandlerResult> {
            Box::pin(f(session, next))
        },
    )
}

/// Handle returned when registering middleware, used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MiddlewareId(pub(crate) u64);

/// What an entry of the middleware list is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    /// Registered through a context.
    Plain,
    /// The built-in preprocessor.
    Preprocessor,
    /// A pending suggestion confirmation; may end a run before the
    /// preprocessor.
    OneShot,
}

/// One entry of the global middleware list.
#[derive(Clone)]
pub(crate) struct MiddlewareEntry {
    pub id: MiddlewareId,
    pub scope: ScopeSet,
    pub role: Role,
    pub handler: Middleware,
}

const WARNING_CAPACITY: usize = 64;

/// Run counter, live set and warning channel.
pub(crate) struct PipelineState {
    counter: AtomicU64,
    live: Mutex<HashSet<u64>>,
    warnings: broadcast::Sender<PipelineWarning>,
}

impl Default for PipelineState {
    fn default() -> Self {
        let (warnings, _) = broadcast::channel(WARNING_CAPACITY);
        Self {
            counter: AtomicU64::new(0),
            live: Mutex::new(HashSet::new()),
            warnings,
        }
    }
}

impl PipelineState {
    fn begin(&self) -> u64 {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.live.lock().insert(id);
        crate::metrics::pipeline_started();
        id
    }

    fn finish(&self, id: u64) {
        self.live.lock().remove(&id);
        crate::metrics::pipeline_finished();
    }

    fn is_live(&self, id: u64) -> bool {
        self.live.lock().contains(&id)
    }

    /// Logs, counts and broadcasts a warning.
    pub(crate) fn warn(&self, warning: PipelineWarning) {
        warn!(kind = warning.kind(), "{}", warning);
        crate::metrics::record_pipeline_warning(warning.kind());
        // No subscribers is fine.
        let _ = self.warnings.send(warning);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<PipelineWarning> {
        self.warnings.subscribe()
    }
}

struct ChainRun {
    id: u64,
    app: Arc<AppState>,
    session: Arc<Session>,
    chain: Mutex<Vec<Middleware>>,
    cursor: AtomicUsize,
}

/// Continuation of a middleware chain.
///
/// Clones share the cursor, so calling any clone advances the same run.
#[derive(Clone)]
pub struct Next {
    run: Arc<ChainRun>,
}

impl Next {
    /// The event being processed.
    pub fn session(&self) -> &Arc<Session> {
        &self.run.session
    }

    /// Id of the pipeline run this continuation belongs to.
    pub fn run_id(&self) -> u64 {
        self.run.id
    }

    /// Invokes the next middleware in the chain.
    pub fn run(&self) -> BoxFuture<'static, HandlerResult> {
        let next = self.clone();
        Box::pin(async move {
            let run = &next.run;
            if !run.app.pipeline.is_live(run.id) {
                run.app
                    .pipeline
                    .warn(PipelineWarning::IsolatedNext { run: run.id });
                return Ok(());
            }
            let index = run.cursor.fetch_add(1, Ordering::SeqCst);
            let handler = run.chain.lock().get(index).cloned();
            match handler {
                Some(handler) => handler(run.session.clone(), next.clone()).await,
                None => Ok(()),
            }
        })
    }

    /// Appends `fallback` to the end of the chain, then continues.
    ///
    /// The fallback only runs if every later middleware passes the event on.
    pub fn fallback<F, Fut>(&self, fallback: F) -> BoxFuture<'static, HandlerResult>
    where
        F: FnOnce(Next) -> Fut + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        if self.run.app.pipeline.is_live(self.run.id) {
            let slot = Mutex::new(Some(fallback));
            let handler: Middleware = Arc::new(
                move |_session: Arc<Session>, next: Next| -> BoxFuture<'static, HandlerResult> {
                    match slot.lock().take() {
                        Some(fallback) => Box::pin(fallback(next)),
                        None => Box::pin(async { Ok(()) }),
                    }
                },
            );
            self.run.chain.lock().push(handler);
        }
        self.run()
    }
}

/// Runs the middleware chain for one message event.
pub(crate) async fn run_pipeline(app: &Arc<AppState>, session: Arc<Session>) {
    let target = session.target();
    let (chain, preprocessor, one_shots) = {
        let registry = app.registry.read();
        let mut preprocessor = None;
        let mut one_shots = Vec::new();
        let mut chain = Vec::new();
        for entry in registry
            .middleware
            .iter()
            .filter(|e| e.scope.matches_target(target))
        {
            match entry.role {
                Role::Preprocessor => preprocessor = Some(chain.len()),
                Role::OneShot => one_shots.push(chain.len()),
                Role::Plain => {}
            }
            chain.push(entry.handler.clone());
        }
        (chain, preprocessor, one_shots)
    };

    let id = app.pipeline.begin();
    let run = Arc::new(ChainRun {
        id,
        app: app.clone(),
        session: session.clone(),
        chain: Mutex::new(chain),
        cursor: AtomicUsize::new(0),
    });

    let result = Next { run: run.clone() }.run().await;
    app.pipeline.finish(id);
    // Fallbacks may hold continuations of this run.
    run.chain.lock().clear();

    if let Err(e) = result {
        error!(path = %session.path(), error = %e, "Middleware chain failed");
        crate::metrics::record_handler_error(e.error_code());
    }

    let cursor = run.cursor.load(Ordering::SeqCst);
    let stopped_at_one_shot = cursor
        .checked_sub(1)
        .is_some_and(|last| one_shots.contains(&last));
    if let Some(index) = preprocessor
        && cursor <= index
        && !stopped_at_one_shot
    {
        app.pipeline.warn(PipelineWarning::PremiddlewareInterception {
            run: id,
            path: session.path().to_string(),
        });
    }

    if let Err(e) = session.flush_user().await {
        error!(path = %session.path(), error = %e, "Failed to flush user record");
        crate::metrics::record_handler_error(e.error_code());
    }
}
