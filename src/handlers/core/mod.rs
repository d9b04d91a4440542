//! Core runtime infrastructure.
//!
//! This module contains the registries, registration contexts, the
//! middleware pipeline and per-context event receivers.
//!
//! ## Flow
//!
//! - [`Context`]: registration root bound to a scope
//! - [`Receiver`]: event subscriptions of one context
//! - [`Next`]: continuation handed to every middleware

pub mod context;
pub mod middleware;
pub mod receiver;
pub(crate) mod registry;

pub use context::{Context, GroupOptions, PluginOptions};
pub use middleware::{Middleware, MiddlewareId, Next};
pub use receiver::{Listener, ListenerId, Receiver};
