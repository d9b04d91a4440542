//! Commands: declaration, builder API and execution.
//!
//! A [`Command`] is created through [`Context::command`] and configured
//! with the chainable builder methods below:
//!
//! ```ignore
//! app.command("echo <text...>")?
//!     .description("Repeat a message")
//!     .option("-u, --upper", "Shout it")?
//!     .alias("say")?
//!     .action(|inv| async move { inv.reply(&inv.arg(0)).await });
//! ```
//!
//! [`Context::command`]: crate::handlers::Context::command

mod config;
mod execute;
pub(crate) mod help;

pub use config::{CommandConfig, PerUser};
pub use execute::Invocation;

use cqbot_proto::grammar::{
    ArgDecl, OptionDecl, OptionSettings, OptionTable, ParsedLine, parse_arguments, parse_line,
};
use cqbot_proto::ScopeSet;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use crate::app::AppState;
use crate::error::{HandlerResult, RegistrationError};
use crate::handlers::core::Context;
use crate::handlers::shortcut::{Shortcut, ShortcutConfig};

/// A command action.
pub type Action = Arc<dyn Fn(Invocation) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Mutable part of a command, guarded by one lock.
pub(crate) struct CommandState {
    pub declaration: String,
    pub args: Vec<ArgDecl>,
    pub options: OptionTable,
    pub config: CommandConfig,
    pub aliases: Vec<String>,
    pub parent: Option<Weak<Command>>,
    pub children: Vec<Arc<Command>>,
    pub shortcuts: Vec<String>,
    pub user_fields: BTreeSet<String>,
    pub usage: Option<String>,
    pub examples: Vec<String>,
    pub action: Option<Action>,
}

/// A registered command.
pub struct Command {
    name: String,
    scope: ScopeSet,
    app: Weak<AppState>,
    pub(crate) state: RwLock<CommandState>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl Command {
    pub(crate) fn new(
        name: String,
        declaration: &str,
        scope: ScopeSet,
        app: &Arc<AppState>,
    ) -> Arc<Self> {
        let mut options = OptionTable::default();
        if let Ok(help) = OptionDecl::parse("-h, --help", "Show this help message", OptionSettings {
            hidden: true,
            ..Default::default()
        }) {
            let _ = options.insert(help);
        }

        Arc::new(Self {
            state: RwLock::new(CommandState {
                declaration: format!("{} {}", name, declaration.trim()).trim().to_string(),
                args: parse_arguments(declaration),
                options,
                config: CommandConfig::default(),
                aliases: Vec::new(),
                parent: None,
                children: Vec::new(),
                shortcuts: Vec::new(),
                user_fields: BTreeSet::new(),
                usage: None,
                examples: Vec::new(),
                action: None,
            }),
            name,
            scope,
            app: Arc::downgrade(app),
        })
    }

    fn app(&self) -> Result<Arc<AppState>, RegistrationError> {
        self.app
            .upgrade()
            .ok_or_else(|| RegistrationError::Detached(self.name.clone()))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Canonical (lowercase) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Conversations the command may run in.
    pub fn scope(&self) -> &ScopeSet {
        &self.scope
    }

    /// Name followed by the argument declaration, e.g. `echo <text>`.
    pub fn declaration(&self) -> String {
        self.state.read().declaration.clone()
    }

    pub fn aliases(&self) -> Vec<String> {
        self.state.read().aliases.clone()
    }

    /// Snapshot of the policy configuration.
    pub fn settings(&self) -> CommandConfig {
        self.state.read().config.clone()
    }

    pub fn args(&self) -> Vec<ArgDecl> {
        self.state.read().args.clone()
    }

    pub fn options(&self) -> OptionTable {
        self.state.read().options.clone()
    }

    pub fn parent(&self) -> Option<Arc<Command>> {
        self.state.read().parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn children(&self) -> Vec<Arc<Command>> {
        self.state.read().children.clone()
    }

    /// Shortcut phrases that trigger this command.
    pub fn shortcuts(&self) -> Vec<String> {
        self.state.read().shortcuts.clone()
    }

    /// Extra user fields the action reads.
    pub fn required_fields(&self) -> Vec<String> {
        self.state.read().user_fields.iter().cloned().collect()
    }

    pub fn has_action(&self) -> bool {
        self.state.read().action.is_some()
    }

    /// Tokenizes `text` (the part after the command name).
    pub fn parse(&self, text: &str) -> ParsedLine {
        let state = self.state.read();
        parse_line(text, &state.args, &state.options)
    }

    // ------------------------------------------------------------------
    // Builder
    // ------------------------------------------------------------------

    /// Declares an option such as `-b, --beta <beta>`.
    pub fn option(
        self: &Arc<Self>,
        raw: &str,
        description: &str,
    ) -> Result<Arc<Self>, RegistrationError> {
        self.option_with(raw, description, OptionSettings::default())
    }

    /// Declares an option with explicit settings.
    pub fn option_with(
        self: &Arc<Self>,
        raw: &str,
        description: &str,
        settings: OptionSettings,
    ) -> Result<Arc<Self>, RegistrationError> {
        let decl = OptionDecl::parse(raw, description, settings)
            .map_err(|e| RegistrationError::InvalidOption(e.to_string()))?;
        self.state
            .write()
            .options
            .insert(decl)
            .map_err(RegistrationError::DuplicateOption)?;
        Ok(self.clone())
    }

    /// Adds an alternative name.
    pub fn alias(self: &Arc<Self>, name: &str) -> Result<Arc<Self>, RegistrationError> {
        let name = name.trim().to_lowercase();
        validate_name(&name)?;
        let app = self.app()?;
        app.registry.write().register_name(&name, self)?;
        let mut state = self.state.write();
        if !state.aliases.contains(&name) {
            state.aliases.push(name);
        }
        Ok(self.clone())
    }

    /// Registers a child command; `raw` may carry its own declaration.
    pub fn subcommand(self: &Arc<Self>, raw: &str) -> Result<Arc<Command>, RegistrationError> {
        self.subcommand_with(raw, CommandConfig::default())
    }

    /// Registers a child command with configuration.
    pub fn subcommand_with(
        self: &Arc<Self>,
        raw: &str,
        config: CommandConfig,
    ) -> Result<Arc<Command>, RegistrationError> {
        let app = self.app()?;
        let context = Context::for_scope(&app, self.scope.clone());
        context.command_with(&format!("{}/{}", self.name, raw.trim()), config)
    }

    /// Registers a trigger phrase that runs this command.
    pub fn shortcut(
        self: &Arc<Self>,
        name: &str,
        config: ShortcutConfig,
    ) -> Result<Arc<Self>, RegistrationError> {
        let app = self.app()?;
        app.registry.write().shortcuts.push(Shortcut {
            name: name.to_string(),
            command: self.clone(),
            config,
        });
        self.state.write().shortcuts.push(name.to_string());
        Ok(self.clone())
    }

    /// Sets the free-form usage text shown in help.
    pub fn usage(self: &Arc<Self>, text: &str) -> Arc<Self> {
        self.state.write().usage = Some(text.to_string());
        self.clone()
    }

    /// Adds an example line shown in help.
    pub fn example(self: &Arc<Self>, text: &str) -> Arc<Self> {
        self.state.write().examples.push(text.to_string());
        self.clone()
    }

    /// Declares user fields the action needs loaded.
    pub fn user_fields(self: &Arc<Self>, fields: &[&str]) -> Arc<Self> {
        let mut state = self.state.write();
        state
            .user_fields
            .extend(fields.iter().map(|f| f.to_string()));
        drop(state);
        self.clone()
    }

    pub fn description(self: &Arc<Self>, text: &str) -> Arc<Self> {
        self.state.write().config.description = Some(text.to_string());
        self.clone()
    }

    /// Merges configuration into the command.
    pub fn config(self: &Arc<Self>, config: CommandConfig) -> Arc<Self> {
        self.state.write().config.merge(config);
        self.clone()
    }

    /// Sets the action run on a successful invocation.
    pub fn action<F, Fut>(self: &Arc<Self>, f: F) -> Arc<Self>
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let action: Action =
            Arc::new(move |invocation: Invocation| -> BoxFuture<'static, HandlerResult> {
                Box::pin(f(invocation))
            });
        self.state.write().action = Some(action);
        self.clone()
    }
}

/// Checks a single command name segment.
pub(crate) fn validate_name(name: &str) -> Result<(), RegistrationError> {
    let invalid = name.is_empty()
        || name.starts_with('-')
        || name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '“' | '”' | '<' | '>' | '[' | ']'));
    if invalid {
        return Err(RegistrationError::InvalidName(name.to_string()));
    }
    Ok(())
}
