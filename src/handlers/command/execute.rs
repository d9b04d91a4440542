//! Command execution: validation, authority and usage gates, then the
//! action.

use chrono::Utc;
use cqbot_proto::grammar::{Argument, OptionValue, Options, ParsedLine, materialize, strip_brackets};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::{Instrument, debug};

use super::Command;
use crate::error::{HandlerResult, Rejection};
use crate::handlers::core::Next;
use crate::state::{ObservedRecord, Session, today, update_usage, user::fields};
use crate::telemetry::{CommandTimer, spans};

/// Everything a command action receives.
pub struct Invocation {
    pub session: Arc<Session>,
    pub command: Arc<Command>,
    /// One entry per declared argument slot.
    pub args: Vec<Argument>,
    /// Options keyed by camelCase name.
    pub options: Options,
    /// Option names that matched no declaration.
    pub unknown: Vec<String>,
    /// Text after a bare `--`.
    pub rest: String,
    next: Option<Next>,
}

impl Invocation {
    /// Argument slot `index` as text; empty when absent.
    pub fn arg(&self, index: usize) -> String {
        self.args.get(index).map(Argument::text).unwrap_or_default()
    }

    /// Option `key`, falling back to its declared default.
    pub fn option(&self, key: &str) -> Option<OptionValue> {
        if let Some(value) = self.options.get(key) {
            return Some(value.clone());
        }
        let state = self.command.state.read();
        state.options.by_key(key)?.default_for(key)
    }

    /// Whether option `key` is set to a truthy value.
    pub fn flag(&self, key: &str) -> bool {
        self.option(key).is_some_and(|v| v.is_truthy())
    }

    /// Replies in the invoking conversation.
    pub async fn reply(&self, text: &str) -> HandlerResult {
        self.session.send(text).await?;
        Ok(())
    }

    /// Passes the event on to the rest of the middleware chain.
    ///
    /// Does nothing when the command was not invoked from the pipeline.
    pub async fn next(&self) -> HandlerResult {
        match &self.next {
            Some(next) => next.run().await,
            None => Ok(()),
        }
    }
}

/// Outcome of the authority and usage gates.
enum Gate {
    Pass,
    /// Stop without replying.
    Silent,
    Reject(Rejection),
}

impl Command {
    /// Runs the command for `session` with an already parsed line.
    pub(crate) fn execute(
        self: &Arc<Self>,
        session: Arc<Session>,
        line: ParsedLine,
        next: Option<Next>,
    ) -> BoxFuture<'static, HandlerResult> {
        let command = self.clone();
        Box::pin(async move { command.run(session, line, next).await })
    }

    async fn run(
        self: Arc<Self>,
        session: Arc<Session>,
        line: ParsedLine,
        next: Option<Next>,
    ) -> HandlerResult {
        let (action, has_children) = {
            let state = self.state.read();
            (state.action.clone(), !state.children.is_empty())
        };
        let wants_help = line.options.get("help").is_some_and(OptionValue::is_truthy);
        if (has_children && action.is_none()) || wants_help {
            return session
                .app()
                .run_command("help", &session, vec![self.name.clone()], Options::new())
                .await;
        }
        let Some(action) = action else {
            return Ok(());
        };

        if let Err(rejection) = self.validate(&line) {
            return self.reject(&session, rejection).await;
        }

        let mut wanted = vec![fields::AUTHORITY.to_string(), fields::USAGE.to_string()];
        wanted.extend(self.required_fields());
        let wanted: Vec<&str> = wanted.iter().map(String::as_str).collect();
        session.observe_user(&wanted).await?;

        let gate = match session.user().await.as_mut() {
            Some(user) => self.check_policy(user, &line),
            None => Gate::Reject(Rejection::LowAuthority),
        };
        match gate {
            Gate::Pass => {}
            Gate::Silent => {
                debug!(command = %self.name, "Command called within its minimum interval");
                return Ok(());
            }
            Gate::Reject(rejection) => return self.reject(&session, rejection).await,
        }

        let args = {
            let state = self.state.read();
            materialize(&state.args, &line)
        };
        let invocation = Invocation {
            session: session.clone(),
            command: self.clone(),
            args,
            options: line.options,
            unknown: line.unknown,
            rest: line.rest,
            next,
        };

        let target = session.target().map(|t| t.to_string());
        let span = spans::command(&self.name, session.user_id(), target.as_deref());
        let _timer = CommandTimer::new(self.name.clone());
        debug!(command = %self.name, "Executing command");
        action(invocation).instrument(span).await
    }

    /// Argument count, unknown option and required option checks.
    fn validate(&self, line: &ParsedLine) -> Result<(), Rejection> {
        let state = self.state.read();
        let config = &state.config;

        if config.check_arg_count.unwrap_or(false) {
            let missing = state
                .args
                .iter()
                .enumerate()
                .any(|(i, slot)| slot.required && i >= line.supplied);
            if missing {
                return Err(Rejection::InsufficientArguments);
            }
            let open_ended = state.args.last().is_some_and(|s| s.variadic || s.greedy);
            if line.supplied > state.args.len() && !open_ended {
                return Err(Rejection::RedundantArguments);
            }
        }

        if config.check_unknown.unwrap_or(false) && !line.unknown.is_empty() {
            return Err(Rejection::UnknownOptions(line.unknown.clone()));
        }

        if config.check_required.unwrap_or(false) {
            let missing: Vec<String> = state
                .options
                .iter()
                .filter(|decl| decl.required && !decl.is_supplied(&line.options))
                .map(|decl| strip_brackets(&decl.raw_name).to_string())
                .collect();
            if !missing.is_empty() {
                return Err(Rejection::MissingOptions(missing));
            }
        }
        Ok(())
    }

    /// Authority, interval and daily usage gates.
    ///
    /// Usage is only counted when every gate passes.
    fn check_policy(&self, user: &mut ObservedRecord, line: &ParsedLine) -> Gate {
        let state = self.state.read();
        let config = &state.config;
        let authority = user.get_i64(fields::AUTHORITY).unwrap_or(0);

        if config.required_authority() > authority {
            return Gate::Reject(Rejection::LowAuthority);
        }
        let mut billable = true;
        for decl in state.options.iter().filter(|d| d.is_supplied(&line.options)) {
            if decl.settings.authority > authority {
                return Gate::Reject(Rejection::LowAuthority);
            }
            if decl.settings.not_usage {
                billable = false;
            }
        }

        let interval = i64::try_from(config.min_interval_for(user).as_millis()).unwrap_or(i64::MAX);
        if !billable && interval == 0 {
            return Gate::Pass;
        }
        let max_usage = config.max_usage_for(user);
        if max_usage.is_none() && interval == 0 {
            return Gate::Pass;
        }

        let key = config.usage_name.clone().unwrap_or_else(|| self.name.clone());
        let usage = update_usage(user, &key, &today());

        if interval > 0 {
            let now = Utc::now().timestamp_millis();
            if now - usage.last <= interval {
                return if config.show_warning.unwrap_or(false) {
                    Gate::Reject(Rejection::TooFrequent)
                } else {
                    Gate::Silent
                };
            }
            user.view(fields::USAGE).view(&key).set("last", now);
        }

        if billable {
            if let Some(max) = max_usage
                && u64::try_from(usage.count).unwrap_or(0) >= max
            {
                return Gate::Reject(Rejection::UsageExhausted);
            }
            user.view(fields::USAGE).view(&key).increment("count", 1);
        }
        Gate::Pass
    }

    /// Logs, counts and answers a rejection.
    async fn reject(&self, session: &Session, rejection: Rejection) -> HandlerResult {
        debug!(command = %self.name, reason = rejection.code(), "Command rejected");
        crate::metrics::record_rejection(&self.name, rejection.code());
        let custom = {
            let state = self.state.read();
            match rejection {
                Rejection::LowAuthority => state.config.authority_hint.clone(),
                Rejection::UsageExhausted => state.config.max_usage_text.clone(),
                _ => None,
            }
        };
        let text = custom.unwrap_or_else(|| rejection.message());
        session.send(&text).await?;
        Ok(())
    }
}
