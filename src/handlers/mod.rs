//! Message handling.
//!
//! The built-in [`preprocess`] middleware resolves commands and shortcuts,
//! applies group and user gates, then runs the command or falls back to
//! [`suggest`]ing a similar name.

pub mod command;
pub mod core;
pub(crate) mod preprocess;
pub mod shortcut;
pub(crate) mod suggest;

pub use self::command::{Command, CommandConfig, Invocation, PerUser};
pub use self::core::{
    Context, GroupOptions, ListenerId, Middleware, MiddlewareId, Next, PluginOptions, Receiver,
};
pub use self::shortcut::ShortcutConfig;
