//! cqbot - contextual message-bot runtime for CQHTTP-style gateways.
//!
//! Events posted by the gateway are classified into hierarchical paths,
//! fanned out to the contexts whose scope covers them, and run through a
//! middleware chain whose built-in preprocessor resolves commands.
//!
//! ```no_run
//! use cqbot::{App, AppOptions, LogSender, MemoryStore};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), cqbot::RegistrationError> {
//! let app = App::new(AppOptions::default(), Arc::new(MemoryStore::new()), Arc::new(LogSender))?;
//! app.groups()
//!     .command("echo <text...>")?
//!     .action(|inv| async move { inv.reply(&inv.arg(0)).await });
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod network;
pub mod security;
pub mod state;
pub mod telemetry;

pub use app::{App, AppOptions};
pub use db::{Database, MemoryStore, Store};
pub use error::{HandlerError, HandlerResult, PipelineWarning, Rejection, RegistrationError};
pub use handlers::{
    Command, CommandConfig, Context, GroupOptions, Invocation, MiddlewareId, Next, PerUser,
    PluginOptions, ShortcutConfig,
};
pub use network::{
    DEFAULT_BAN, FriendInfo, GatewayApi, GroupInfo, GroupMemberInfo, GroupRequestKind, HttpSender,
    LogSender, LoginInfo, SendError, Sender, StrangerInfo,
};
pub use state::Session;
