//! The built-in `help` command.

use std::fmt::Write;
use std::sync::Arc;

use super::{Command, CommandConfig, Invocation};
use crate::error::{HandlerResult, Rejection, RegistrationError};
use crate::handlers::core::Context;
use crate::state::{today, user::fields};

/// Registers `help [command]` on `ctx`.
pub(crate) fn install(ctx: &Context) -> Result<(), RegistrationError> {
    ctx.command_with(
        "help [command]",
        CommandConfig::new()
            .authority(0)
            .description("Show available commands or details about one"),
    )?
    .example("help echo")
    .action(show);
    Ok(())
}

async fn show(invocation: Invocation) -> HandlerResult {
    let name = invocation.arg(0);
    let session = &invocation.session;
    let text = if name.is_empty() {
        command_list(session.app().list_commands(session.target()))
    } else {
        match session.app().get_command(&name, session.target()) {
            Some(command) => describe(&command, &invocation).await,
            None => Rejection::CommandNotFound.message(),
        }
    };
    invocation.reply(&text).await
}

fn command_list(mut commands: Vec<Arc<Command>>) -> String {
    commands.retain(|c| c.parent().is_none() && !c.state.read().config.is_hidden());
    commands.sort_by(|a, b| a.name().cmp(b.name()));

    let mut text = String::from("Available commands:");
    for command in &commands {
        let state = command.state.read();
        match &state.config.description {
            Some(description) => {
                let _ = write!(text, "\n    {}  {}", command.name(), description);
            }
            None => {
                let _ = write!(text, "\n    {}", command.name());
            }
        }
    }
    text.push_str("\nSend \"help <command>\" for details about a command.");
    text
}

async fn describe(command: &Arc<Command>, invocation: &Invocation) -> String {
    let config = command.settings();
    let mut text = command.declaration();
    if let Some(description) = &config.description {
        let _ = write!(text, "\n{}", description);
    }

    let aliases = command.aliases();
    if !aliases.is_empty() {
        let _ = write!(text, "\nAliases: {}.", aliases.join(", "));
    }
    let shortcuts = command.shortcuts();
    if !shortcuts.is_empty() {
        let _ = write!(text, "\nShortcuts: {}.", shortcuts.join(", "));
    }
    let _ = write!(text, "\nMinimum authority: {}.", config.required_authority());

    if let Some(user) = invocation.session.user().await.as_ref() {
        if let Some(max) = config.max_usage_for(user) {
            let key = config.usage_name.as_deref().unwrap_or(command.name());
            // Usage keys may contain dots, so no dotted-path lookup here.
            let entry = user.get(fields::USAGE).and_then(|usage| usage.get(key));
            let used = entry
                .filter(|e| e.get("date").and_then(|d| d.as_str()) == Some(today().as_str()))
                .and_then(|e| e.get("count"))
                .and_then(|c| c.as_i64())
                .unwrap_or(0);
            let _ = write!(text, "\nDaily usage: {}/{}.", used, max);
        }
        let interval = config.min_interval_for(user);
        if !interval.is_zero() {
            let _ = write!(text, "\nMinimum interval: {}s.", interval.as_secs_f64());
        }
    }

    let options = command.options();
    let visible: Vec<_> = options.iter().filter(|o| !o.settings.hidden).collect();
    if !visible.is_empty() {
        text.push_str("\nOptions:");
        for option in visible {
            let _ = write!(text, "\n    {}  {}", option.raw_name, option.description);
        }
    }

    let (usage, examples) = {
        let state = command.state.read();
        (state.usage.clone(), state.examples.clone())
    };
    if let Some(usage) = usage {
        let _ = write!(text, "\n{}", usage);
    }
    if !examples.is_empty() {
        text.push_str("\nExamples:");
        for example in examples {
            let _ = write!(text, "\n    {}", example);
        }
    }

    let children = command.children();
    if !children.is_empty() {
        text.push_str("\nSubcommands:");
        for child in children {
            match child.settings().description {
                Some(description) => {
                    let _ = write!(text, "\n    {}  {}", child.name(), description);
                }
                None => {
                    let _ = write!(text, "\n    {}", child.name());
                }
            }
        }
    }
    text
}
