//! Registration contexts.
//!
//! A [`Context`] is a registration root bound to one [`ScopeSet`]. Every
//! command, middleware and listener registered through it is tagged with
//! that scope. Contexts are cheap handles: deriving the same scope twice
//! yields contexts sharing one [`Receiver`].

use cqbot_proto::grammar::{Options, ParsedLine};
use cqbot_proto::{ScopeSet, Target};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use super::middleware::{MiddlewareId, Next, Role, middleware_fn};
use super::receiver::{ListenerId, Receiver};
use super::registry::Position;
use crate::app::AppState;
use crate::error::{HandlerResult, Rejection, RegistrationError};
use crate::handlers::command::{Command, CommandConfig, validate_name};
use crate::state::{Record, Session, user};

/// Options of a plugin: either enabled with a value or switched off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOptions<O> {
    Enabled(O),
    /// Skip the plugin entirely.
    Disabled,
}

impl<O> From<O> for PluginOptions<O> {
    fn from(options: O) -> Self {
        Self::Enabled(options)
    }
}

/// Options of a group context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupOptions {
    /// Authority granted to members joining the group, if higher than
    /// what they already have.
    pub authority: Option<i64>,
}

/// A registration root bound to one scope.
#[derive(Clone)]
pub struct Context {
    app: Arc<AppState>,
    scope: ScopeSet,
    receiver: Arc<Receiver>,
}

impl Context {
    pub(crate) fn for_scope(app: &Arc<AppState>, scope: ScopeSet) -> Self {
        let receiver = app.registry.write().context(&scope);
        Self {
            app: app.clone(),
            scope,
            receiver,
        }
    }

    pub(crate) fn state(&self) -> &Arc<AppState> {
        &self.app
    }

    pub fn scope(&self) -> &ScopeSet {
        &self.scope
    }

    /// Event subscriptions of this context.
    pub fn receiver(&self) -> &Arc<Receiver> {
        &self.receiver
    }

    // ------------------------------------------------------------------
    // Scope derivation
    // ------------------------------------------------------------------

    /// The context for an arbitrary scope.
    pub fn with_scope(&self, scope: ScopeSet) -> Context {
        Context::for_scope(&self.app, scope)
    }

    /// One private conversation.
    pub fn user(&self, id: i64) -> Context {
        self.with_scope(ScopeSet::user(id))
    }

    /// Every private conversation.
    pub fn users(&self) -> Context {
        self.with_scope(ScopeSet::all_users())
    }

    pub fn group(&self, id: i64) -> Context {
        self.with_scope(ScopeSet::group(id))
    }

    pub fn groups(&self) -> Context {
        self.with_scope(ScopeSet::all_groups())
    }

    pub fn discuss(&self, id: i64) -> Context {
        self.with_scope(ScopeSet::discuss(id))
    }

    pub fn discusses(&self) -> Context {
        self.with_scope(ScopeSet::all_discusses())
    }

    /// The union of both scopes.
    pub fn plus(&self, other: &Context) -> Context {
        self.with_scope(self.scope.union(&other.scope))
    }

    /// This scope without `other`'s.
    pub fn minus(&self, other: &Context) -> Context {
        self.with_scope(self.scope.difference(&other.scope))
    }

    /// Everything outside this scope.
    pub fn inverse(&self) -> Context {
        self.with_scope(self.scope.inverse())
    }

    /// A group context whose new members are granted `options.authority`.
    pub fn group_with(&self, id: i64, options: GroupOptions) -> Context {
        let context = self.group(id);
        if let Some(authority) = options.authority {
            context.grant_on_join(authority);
        }
        context
    }

    fn grant_on_join(&self, authority: i64) -> ListenerId {
        self.receiver.on("group_increase", move |session| {
            grant_authority(session, authority)
        })
    }

    // ------------------------------------------------------------------
    // Middleware
    // ------------------------------------------------------------------

    /// Appends a middleware to the application's chain.
    pub fn middleware<F, Fut>(&self, f: F) -> MiddlewareId
    where
        F: Fn(Arc<Session>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.app.registry.write().add_middleware(
            self.scope.clone(),
            middleware_fn(f),
            Position::Append,
            Role::Plain,
        )
    }

    /// Prepends a middleware, ahead of the built-in preprocessor.
    pub fn premiddleware<F, Fut>(&self, f: F) -> MiddlewareId
    where
        F: Fn(Arc<Session>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.app.registry.write().add_middleware(
            self.scope.clone(),
            middleware_fn(f),
            Position::Prepend,
            Role::Plain,
        )
    }

    pub fn remove_middleware(&self, id: MiddlewareId) -> bool {
        self.app.registry.write().remove_middleware(id)
    }

    // ------------------------------------------------------------------
    // Plugins
    // ------------------------------------------------------------------

    /// Installs a plugin on a child context of this one.
    pub fn plugin<F, O>(
        &self,
        plugin: F,
        options: impl Into<PluginOptions<O>>,
    ) -> Result<(), RegistrationError>
    where
        F: FnOnce(&Context, O) -> Result<(), RegistrationError>,
    {
        match options.into() {
            PluginOptions::Enabled(options) => plugin(&self.clone(), options),
            PluginOptions::Disabled => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Registers or extends a command.
    ///
    /// `raw` is a name path followed by the argument declaration, e.g.
    /// `rank/daily <date>` or `rank.weekly`. Segments after `/` are plain
    /// subcommands; a `.name` segment is named after its parent
    /// (`rank.weekly`). Calling this again for an existing name merges the
    /// new configuration.
    pub fn command(&self, raw: &str) -> Result<Arc<Command>, RegistrationError> {
        self.command_with(raw, CommandConfig::default())
    }

    /// [`Context::command`] with configuration.
    pub fn command_with(
        &self,
        raw: &str,
        config: CommandConfig,
    ) -> Result<Arc<Command>, RegistrationError> {
        let raw = raw.trim();
        let (path, declaration) = match raw.split_once(char::is_whitespace) {
            Some((path, declaration)) => (path, declaration.trim()),
            None => (raw, ""),
        };
        let path = path.to_lowercase();
        let segments = split_path(&path);
        if segments.is_empty() {
            return Err(RegistrationError::InvalidName(raw.to_string()));
        }

        let mut parent: Option<Arc<Command>> = None;
        let last = segments.len() - 1;
        for (index, segment) in segments.into_iter().enumerate() {
            let name = match segment {
                Segment::Dotted(name) => match &parent {
                    Some(parent) => format!("{}.{}", parent.name(), name),
                    None => return Err(RegistrationError::InvalidName(raw.to_string())),
                },
                Segment::Plain(name) => name.to_string(),
            };
            validate_name(name.split('.').next_back().unwrap_or(""))?;
            let declaration = if index == last { declaration } else { "" };
            parent = Some(self.resolve(&name, declaration, parent.as_ref())?);
        }

        let Some(command) = parent else {
            return Err(RegistrationError::InvalidName(raw.to_string()));
        };
        command.state.write().config.merge(config);
        Ok(command)
    }

    /// Finds or creates one segment of a command path.
    fn resolve(
        &self,
        name: &str,
        declaration: &str,
        parent: Option<&Arc<Command>>,
    ) -> Result<Arc<Command>, RegistrationError> {
        let mut registry = self.app.registry.write();

        if let Some(existing) = registry.commands.get(name).cloned() {
            if let Some(parent) = parent {
                if Arc::ptr_eq(&existing, parent) {
                    return Err(RegistrationError::WrongSubcommand(name.to_string()));
                }
                // An existing command is never moved under another parent.
                let current = existing.parent();
                if !current.is_some_and(|current| Arc::ptr_eq(&current, parent)) {
                    return Err(RegistrationError::WrongSubcommand(name.to_string()));
                }
            }
            if !existing.scope().contains(&self.scope) {
                return Err(RegistrationError::WrongContext(name.to_string()));
            }
            return Ok(existing);
        }

        if let Some(parent) = parent
            && !parent.scope().contains(&self.scope)
        {
            return Err(RegistrationError::WrongContext(name.to_string()));
        }
        if self.scope.is_empty() {
            return Err(RegistrationError::WrongContext(name.to_string()));
        }

        let command = Command::new(name.to_string(), declaration, self.scope.clone(), &self.app);
        registry.register_name(name, &command)?;
        registry.command_list.push(command.clone());
        if let Some(parent) = parent {
            command.state.write().parent = Some(Arc::downgrade(parent));
            parent.state.write().children.push(command.clone());
        }
        debug!(command = name, scope = ?self.scope, "Registered command");
        Ok(command)
    }

    /// Looks a command up by name or alias.
    ///
    /// With a `target`, only commands whose scope covers it are returned.
    /// Only the part after the last `/` of `name` is used.
    pub fn get_command(&self, name: &str, target: Option<Target>) -> Option<Arc<Command>> {
        let name = name.rsplit('/').next().unwrap_or(name).to_lowercase();
        let command = self.app.registry.read().commands.get(&name).cloned()?;
        match target {
            Some(target) if !command.scope().matches(target.kind, target.id) => None,
            _ => Some(command),
        }
    }

    /// Commands in registration order, filtered like [`Context::get_command`].
    pub fn list_commands(&self, target: Option<Target>) -> Vec<Arc<Command>> {
        self.app
            .registry
            .read()
            .command_list
            .iter()
            .filter(|c| target.is_none_or(|t| c.scope().matches(t.kind, t.id)))
            .cloned()
            .collect()
    }

    /// Runs a command on behalf of `session` with pre-split arguments.
    ///
    /// Replies "command not found" when the command is unknown here.
    pub async fn run_command(
        &self,
        name: &str,
        session: &Arc<Session>,
        args: Vec<String>,
        options: Options,
    ) -> HandlerResult {
        let Some(command) = self.get_command(name, session.target()) else {
            session.send(&Rejection::CommandNotFound.message()).await?;
            return Ok(());
        };
        let line = ParsedLine {
            source: args.join(" "),
            supplied: args.len(),
            args,
            options,
            ..Default::default()
        };
        command.execute(session.clone(), line, None).await
    }
}

/// Raises a joining member to at least `authority`.
async fn grant_authority(session: Arc<Session>, authority: i64) -> HandlerResult {
    let Some(user_id) = session.user_id() else {
        return Ok(());
    };
    let store = &session.state().store;
    let Some(record) = store
        .get_user(user_id, authority, &[user::fields::AUTHORITY])
        .await?
    else {
        return Ok(());
    };
    let current = record
        .get(user::fields::AUTHORITY)
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    if current < authority {
        let mut diff = Record::new();
        diff.insert(user::fields::AUTHORITY.into(), authority.into());
        store.set_user(user_id, &diff).await?;
        info!(user = user_id, authority, "Granted authority to new group member");
    }
    Ok(())
}

enum Segment<'a> {
    Plain(&'a str),
    /// `.name`, qualified with the parent's name.
    Dotted(&'a str),
}

/// Splits `a/b.c\d` into `[a, b, .c, d]`.
fn split_path(path: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut dotted = false;
    for (i, c) in path.char_indices() {
        if matches!(c, '.' | '/' | '\\') {
            push_segment(&mut segments, &path[start..i], dotted);
            start = i + c.len_utf8();
            dotted = c == '.';
        }
    }
    push_segment(&mut segments, &path[start..], dotted);
    segments
}

fn push_segment<'a>(segments: &mut Vec<Segment<'a>>, text: &'a str, dotted: bool) {
    if dotted {
        segments.push(Segment::Dotted(text));
    } else if !text.is_empty() || segments.is_empty() {
        segments.push(Segment::Plain(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(path: &str) -> Vec<String> {
        split_path(path)
            .into_iter()
            .map(|s| match s {
                Segment::Plain(name) => name.to_string(),
                Segment::Dotted(name) => format!(".{}", name),
            })
            .collect()
    }

    #[test]
    fn test_split_path() {
        assert_eq!(names("echo"), vec!["echo"]);
        assert_eq!(names("rank/daily"), vec!["rank", "daily"]);
        assert_eq!(names("rank.weekly"), vec!["rank", ".weekly"]);
        assert_eq!(names("a\\b/c.d"), vec!["a", "b", "c", ".d"]);
    }

    #[test]
    fn test_plugin_options() {
        assert_eq!(PluginOptions::from(3), PluginOptions::Enabled(3));
        let disabled: PluginOptions<()> = PluginOptions::Disabled;
        assert_eq!(disabled, PluginOptions::Disabled);
    }
}
