//! Shortcuts: trigger phrases that run a command.

use cqbot_proto::grammar::{OptionValue, Options, ParsedLine};
use cqbot_proto::Target;
use std::sync::Arc;

use crate::handlers::command::Command;

/// How a shortcut phrase is matched and what it implies.
#[derive(Debug, Clone, Default)]
pub struct ShortcutConfig {
    /// Only matches when the bot was addressed.
    pub prefix: bool,
    /// Matches when the message starts with the phrase; the remainder is
    /// parsed as arguments.
    pub fuzzy: bool,
    /// Passes the whole remainder as a single argument.
    pub one_arg: bool,
    /// Options applied on top of whatever was parsed.
    pub options: Options,
    /// Shown in help.
    pub authority: i64,
    /// Left out of help.
    pub hidden: bool,
    pub description: Option<String>,
}

impl ShortcutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: bool) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn one_arg(mut self, one_arg: bool) -> Self {
        self.one_arg = one_arg;
        self
    }

    /// Presets option `key` (camelCase).
    pub fn option(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn authority(mut self, authority: i64) -> Self {
        self.authority = authority;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// A registered shortcut.
#[derive(Clone)]
pub(crate) struct Shortcut {
    pub name: String,
    pub command: Arc<Command>,
    pub config: ShortcutConfig,
}

impl Shortcut {
    /// Matches `message` against this shortcut.
    ///
    /// `addressed` is whether the bot was addressed (or the conversation is
    /// private).
    fn matches(&self, message: &str, addressed: bool) -> Option<ParsedLine> {
        let config = &self.config;
        if config.prefix && !addressed {
            return None;
        }
        if !config.fuzzy && message != self.name {
            return None;
        }
        let rest = message.strip_prefix(self.name.as_str())?;
        // A fuzzy phrase must end at a word boundary.
        if config.fuzzy && !config.prefix && rest.starts_with(|c: char| !c.is_whitespace()) {
            return None;
        }

        let mut line = if config.one_arg {
            ParsedLine {
                source: rest.to_string(),
                args: vec![rest.trim().to_string()],
                supplied: 1,
                ..Default::default()
            }
        } else {
            self.command.parse(rest)
        };
        line.options
            .extend(config.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        Some(line)
    }
}

/// Finds the first shortcut matching `message` whose command may run in
/// `target`.
pub(crate) fn resolve(
    shortcuts: &[Shortcut],
    message: &str,
    addressed: bool,
    target: Option<Target>,
) -> Option<(Arc<Command>, ParsedLine)> {
    shortcuts.iter().find_map(|shortcut| {
        if !shortcut.command.scope().matches_target(target) {
            return None;
        }
        let line = shortcut.matches(message, addressed)?;
        Some((shortcut.command.clone(), line))
    })
}
