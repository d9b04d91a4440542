//! Event dispatch.
//!
//! Pipeline stages:
//! 1. Learn the bot's own id from the first event that carries one
//! 2. Load the group policy record for group messages
//! 3. Fan the event out to every matching context's receiver, in context
//!    creation order
//! 4. Run the middleware chain for message events

use cqbot_proto::Event;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::{Instrument, debug, error, warn};

use crate::app::AppState;
use crate::handlers::core::middleware::run_pipeline;
use crate::state::{Session, group};

/// Dispatches one decoded event.
///
/// Boxed because sending a reply re-enters the dispatcher with a synthetic
/// `send` event.
pub(crate) fn dispatch_event(app: Arc<AppState>, event: Event) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        learn_self_id(&app, &event);
        crate::metrics::record_event(event.post_type());

        let group = match &event {
            Event::Message(message) => match message.group_id {
                Some(group_id) => {
                    let fetched = app
                        .store
                        .get_group(group_id, app.self_id(), &group::fields::ALL)
                        .await;
                    match fetched {
                        Ok(record) => Some(record),
                        Err(e) => {
                            error!(group = group_id, error = %e, "Failed to load group record");
                            crate::metrics::record_handler_error("db_error");
                            return;
                        }
                    }
                }
                None => None,
            },
            _ => None,
        };

        let is_message = matches!(event, Event::Message(_));
        let session = Arc::new(Session::new(app.clone(), event, group));
        let span = crate::telemetry::spans::dispatch(&session.path().to_string(), session.user_id());

        async move {
            let target = session.target();
            let receivers: Vec<_> = app
                .registry
                .read()
                .contexts
                .iter()
                .filter(|slot| slot.scope.matches_target(target))
                .map(|slot| slot.receiver.clone())
                .collect();

            let names = session.path().event_names();
            let mut fired = 0;
            for receiver in &receivers {
                for name in &names {
                    fired += receiver.emit(name, session.clone()).await;
                }
            }
            debug!(contexts = receivers.len(), listeners = fired, "Event fanned out");

            if is_message {
                run_pipeline(&app, session).await;
            }
        }
        .instrument(span)
        .await
    })
}

/// Adopts the gateway-reported bot id when none was configured.
fn learn_self_id(app: &AppState, event: &Event) {
    if app.self_id() != 0 {
        return;
    }
    let reported = match event {
        Event::Message(e) => e.self_id,
        Event::Notice(e) => e.self_id,
        Event::Request(e) => e.self_id,
        Event::MetaEvent(e) => e.self_id,
        Event::Send(e) => e.self_id,
    };
    if reported == 0 {
        return;
    }
    if let Err(e) = app.set_self_id(reported) {
        warn!(self_id = reported, error = %e, "Failed to rebuild addressing prefixes");
    }
}
