//! The built-in preprocessor middleware.
//!
//! Runs first for every message (unless a premiddleware intercepts):
//!
//! 1. strips the addressing prefix and normalizes width,
//! 2. resolves a command or shortcut,
//! 3. loads the user fields needed from here on,
//! 4. applies the group gate (assignee, `NO_COMMAND`, `NO_RESPONSE`) and
//!    the user gate (ignore flag, temporary ignore),
//! 5. executes the command, or offers suggestions for unknown names.

use chrono::Utc;
use cqbot_proto::grammar::ParsedLine;
use cqbot_proto::util::simplify;
use cqbot_proto::{ContextKind, Target};
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::error::{HandlerResult, RegistrationError};
use crate::handlers::command::Command;
use crate::handlers::core::Next;
use crate::handlers::core::registry::Registry;
use crate::handlers::{shortcut, suggest};
use crate::state::{GroupRecordExt, Session, day_number, group, update_activity, user};

/// Addressing prefixes for one bot identity.
pub(crate) struct Prefixes {
    multi: Regex,
    private: Regex,
    at_self: String,
}

impl Prefixes {
    /// Builds the prefix patterns for a bot called `name` with `self_id`.
    pub fn new(name: Option<&str>, self_id: i64) -> Result<Self, RegistrationError> {
        let at_self = format!("[CQ:at,qq={}]", self_id);
        let mut multi = vec![format!("{} *", regex::escape(&at_self))];
        let mut private = Vec::new();
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            let name = regex::escape(name);
            multi.push(format!("@{} +", name));
            multi.push(format!("{}[,，\\s] *", name));
            private.push(format!("{}[,，\\s] *", name));
        }
        multi.push("\\.".to_string());
        private.push("\\.".to_string());

        let compile = |alternatives: Vec<String>| {
            Regex::new(&format!("^({})", alternatives.join("|")))
                .map_err(|e| RegistrationError::InvalidName(e.to_string()))
        };
        Ok(Self {
            multi: compile(multi)?,
            private: compile(private)?,
            at_self,
        })
    }

    /// Splits `message` into its addressing prefix and the remainder.
    pub fn strip<'a>(&self, message: &'a str, kind: ContextKind) -> (&'a str, &'a str) {
        let pattern = if kind.is_multi_user() {
            &self.multi
        } else {
            &self.private
        };
        match pattern.find(message) {
            Some(m) => message.split_at(m.end()),
            None => ("", message),
        }
    }

    /// Whether `prefix` mentions this bot.
    fn mentions_self(&self, prefix: &str) -> bool {
        prefix.contains(&self.at_self)
    }
}

/// Resolves `text` as `<name> <arguments>` against the registered names.
///
/// The command must be allowed to run in `target`.
pub(crate) fn parse_command(
    registry: &Registry,
    text: &str,
    target: Option<Target>,
) -> Option<(Arc<Command>, ParsedLine)> {
    let token = text.split(char::is_whitespace).next().unwrap_or("");
    let command = registry.commands.get(&token.to_lowercase())?;
    if !command.scope().matches_target(target) {
        return None;
    }
    debug!(command = command.name(), "Resolved command");
    let line = command.parse(text[token.len()..].trim_start());
    Some((command.clone(), line))
}

/// Applies the group gate (assignee, `NO_COMMAND`, `NO_RESPONSE`) and the
/// user gate (ignore flag, temporary ignore).
///
/// Returns `None` when the message must be dropped, otherwise whether the
/// rest of the chain may see it. The user's `flag` and `ignore_end` fields
/// must already be observed.
pub(crate) async fn admit(session: &Session, is_command: bool, addressed: bool) -> Option<bool> {
    // Without the assignment, next() becomes a no-op.
    let mut allow_next = true;
    if let Some(group) = session.group() {
        let no_command = group.flag() & group::flags::NO_COMMAND != 0;
        let is_assignee = group.assignee() == session.state().self_id();
        let no_response = group.flag() & group::flags::NO_RESPONSE != 0 || !is_assignee;
        if no_response {
            allow_next = false;
        }
        if no_command && is_command {
            debug!(path = %session.path(), "Commands are disabled in this group");
            return None;
        }
        if no_response && !addressed {
            return None;
        }
    }

    if let Some(user) = session.user().await.as_mut() {
        if user.get_i64(user::fields::FLAG).unwrap_or(0) & user::flags::IGNORE != 0 {
            return None;
        }
        let ignore_end = user.get_i64(user::fields::IGNORE_END).unwrap_or(0);
        if ignore_end != 0 {
            if ignore_end >= Utc::now().timestamp() {
                return None;
            }
            user.set(user::fields::IGNORE_END, 0);
        }
    }
    Some(allow_next)
}

/// The preprocessor middleware.
pub(crate) async fn preprocess(session: Arc<Session>, next: Next) -> HandlerResult {
    let Some(target) = session.target() else {
        return next.run().await;
    };
    let app = session.state().clone();
    let prefixes = app.prefixes();

    let (prefix, rest) = prefixes.strip(session.text().trim(), target.kind);
    let text = simplify(rest);
    let can_be_command = target.kind == ContextKind::User || !prefix.is_empty();
    let can_be_shortcut = prefix != ".";

    let parsed = {
        let registry = app.registry.read();
        let mut parsed = None;
        if can_be_command {
            parsed = parse_command(&registry, &text, Some(target));
        }
        if parsed.is_none() && can_be_shortcut {
            parsed = shortcut::resolve(&registry.shortcuts, &text, can_be_command, Some(target));
        }
        parsed
    };

    let mut fields: Vec<String> = vec![
        user::fields::NAME.into(),
        user::fields::FLAG.into(),
        user::fields::IGNORE_END.into(),
    ];
    match &parsed {
        Some((command, _)) => {
            fields.push(user::fields::USAGE.into());
            fields.push(user::fields::AUTHORITY.into());
            fields.extend(command.required_fields());
        }
        None if target.kind == ContextKind::Group => {
            fields.push(user::fields::TALKATIVENESS.into());
        }
        None => {}
    }
    let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
    session.observe_user(&fields).await?;

    if parsed.is_none()
        && let Some(group) = session.group()
        && group.assignee() == app.self_id()
        && let Some(user) = session.user().await.as_mut()
    {
        update_activity(user, target.id, day_number());
    }

    let addressed = prefixes.mentions_self(prefix);
    let Some(allow_next) = admit(&session, parsed.is_some(), addressed).await else {
        return Ok(());
    };

    if let Some((command, line)) = parsed {
        let next = allow_next.then_some(next);
        return command.execute(session, line, next).await;
    }
    if !allow_next {
        return Ok(());
    }

    let token = text.split(char::is_whitespace).next().unwrap_or("");
    if token.is_empty() || !can_be_command {
        return next.run().await;
    }
    let remainder = text[token.len()..].to_string();
    suggest::offer(session, next, token.to_lowercase(), remainder).await
}
