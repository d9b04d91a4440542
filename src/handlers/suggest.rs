//! "Did you mean" suggestions for unknown command names.
//!
//! When the first word of an addressed message is close to a command name
//! and nothing later in the chain handles the message, the bot lists the
//! candidates. With exactly one candidate it also arms a one-shot
//! middleware: an empty follow-up from the same user in the same
//! conversation runs the suggested command with the original arguments.

use cqbot_proto::util::{char_len, edit_distance};
use cqbot_proto::{ScopeSet, Target};
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::error::{HandlerResult, Rejection};
use crate::handlers::core::middleware::{Role, middleware_fn};
use crate::handlers::core::registry::Position;
use crate::handlers::core::{MiddlewareId, Next};
use crate::handlers::preprocess::{admit, parse_command};
use crate::state::{Session, user};

/// Fraction of a name's length that may differ.
const SIMILARITY: f64 = 0.4;

/// Whether `name` is a plausible intended spelling of `target`.
fn is_similar(name: &str, target: &str) -> bool {
    let len = char_len(name);
    len > 2 && edit_distance(name, target) as f64 <= len as f64 * SIMILARITY
}

/// Names and aliases close to `target` whose command may run here.
fn candidates(session: &Session, target: &str) -> Vec<String> {
    let registry = session.state().registry.read();
    registry
        .commands
        .iter()
        .filter(|(name, command)| {
            command.scope().matches_target(session.target()) && is_similar(name, target)
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Offers suggestions for the unknown word `target`, or passes the event on
/// when nothing is similar.
pub(crate) async fn offer(
    session: Arc<Session>,
    next: Next,
    target: String,
    remainder: String,
) -> HandlerResult {
    let suggestions = candidates(&session, &target);
    if suggestions.is_empty() {
        return next.run().await;
    }
    debug!(target = %target, ?suggestions, "Unknown command, suggesting");
    next.fallback(move |_| reply(session, suggestions, remainder))
        .await
}

/// Sends the suggestion and arms the confirmation for a single candidate.
async fn reply(session: Arc<Session>, suggestions: Vec<String>, remainder: String) -> HandlerResult {
    crate::metrics::record_suggestion();
    let quoted: Vec<String> = suggestions.iter().map(|s| format!("“{}”", s)).collect();
    let mut text = format!("Command not found. Did you mean {}?", quoted.join(" or "));
    if let [suggestion] = suggestions.as_slice()
        && let (Some(target), Some(user_id)) = (session.target(), session.user_id())
    {
        arm(&session, target, user_id, suggestion.clone(), remainder);
        text.push_str(" Send an empty line to invoke the suggested command.");
    }
    session.send(&text).await?;
    Ok(())
}

/// Registers the one-shot confirmation middleware at the front of the chain.
fn arm(session: &Session, target: Target, user_id: i64, suggestion: String, remainder: String) {
    let own_id: Arc<OnceLock<MiddlewareId>> = Arc::new(OnceLock::new());
    let slot = own_id.clone();
    let handler = middleware_fn(move |session, next| {
        confirm(
            session,
            next,
            user_id,
            slot.clone(),
            format!("{}{}", suggestion, remainder),
        )
    });

    // The id is set before any run can see the entry.
    let mut registry = session.state().registry.write();
    let id = registry.add_middleware(
        ScopeSet::of(target.kind, [target.id]),
        handler,
        Position::Prepend,
        Role::OneShot,
    );
    let _ = own_id.set(id);
}

async fn confirm(
    session: Arc<Session>,
    next: Next,
    user_id: i64,
    own_id: Arc<OnceLock<MiddlewareId>>,
    line: String,
) -> HandlerResult {
    if session.user_id() != Some(user_id) {
        return next.run().await;
    }
    if let Some(&id) = own_id.get() {
        session.state().registry.write().remove_middleware(id);
    }
    if !session.text().trim().is_empty() {
        return next.run().await;
    }

    let parsed = {
        let registry = session.state().registry.read();
        parse_command(&registry, &line, session.target())
    };
    let Some((command, parsed)) = parsed else {
        session.send(&Rejection::CommandNotFound.message()).await?;
        return Ok(());
    };

    let mut fields = vec![
        user::fields::NAME.to_string(),
        user::fields::FLAG.to_string(),
        user::fields::IGNORE_END.to_string(),
        user::fields::USAGE.to_string(),
        user::fields::AUTHORITY.to_string(),
    ];
    fields.extend(command.required_fields());
    let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
    session.observe_user(&fields).await?;

    // The confirmation line carries no addressing prefix.
    let Some(allow_next) = admit(&session, true, false).await else {
        return Ok(());
    };
    debug!(command = command.name(), "Running confirmed suggestion");
    command.execute(session, parsed, allow_next.then_some(next)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity() {
        assert!(is_similar("help", "hepl"));
        assert!(is_similar("help", "halp"));
        assert!(!is_similar("help", "history"));
        assert!(!is_similar("history", "hepl"));
        // Too short to suggest.
        assert!(!is_similar("ls", "l"));
    }
}
