//! Application-wide registries.
//!
//! The `Registry` owns every context, command, shortcut and middleware of
//! one application. It lives behind a `parking_lot::RwLock` in
//! [`AppState`](crate::app::AppState) and is never held across an await.

use cqbot_proto::ScopeSet;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::middleware::{Middleware, MiddlewareEntry, MiddlewareId, Role};
use super::receiver::Receiver;
use crate::error::RegistrationError;
use crate::handlers::command::Command;
use crate::handlers::shortcut::Shortcut;

/// A memoized context: one receiver per distinct scope.
pub(crate) struct ContextSlot {
    pub scope: ScopeSet,
    pub receiver: Arc<Receiver>,
}

/// Where a middleware is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    Append,
    Prepend,
}

#[derive(Default)]
pub(crate) struct Registry {
    /// Contexts in creation order; events fan out in this order.
    pub contexts: Vec<ContextSlot>,
    /// Every command name and alias.
    pub commands: BTreeMap<String, Arc<Command>>,
    /// Commands in registration order.
    pub command_list: Vec<Arc<Command>>,
    /// Shortcuts in registration order; the first match wins.
    pub shortcuts: Vec<Shortcut>,
    pub middleware: Vec<MiddlewareEntry>,
    next_middleware: u64,
}

impl Registry {
    /// The receiver for `scope`, created on first use.
    pub fn context(&mut self, scope: &ScopeSet) -> Arc<Receiver> {
        if let Some(slot) = self.contexts.iter().find(|slot| &slot.scope == scope) {
            return slot.receiver.clone();
        }
        let receiver = Arc::new(Receiver::default());
        self.contexts.push(ContextSlot {
            scope: scope.clone(),
            receiver: receiver.clone(),
        });
        receiver
    }

    /// Claims `name` for `command`.
    pub fn register_name(
        &mut self,
        name: &str,
        command: &Arc<Command>,
    ) -> Result<(), RegistrationError> {
        match self.commands.get(name) {
            Some(existing) if Arc::ptr_eq(existing, command) => Ok(()),
            Some(_) => Err(RegistrationError::DuplicateCommand(name.to_string())),
            None => {
                self.commands.insert(name.to_string(), command.clone());
                Ok(())
            }
        }
    }

    pub fn add_middleware(
        &mut self,
        scope: ScopeSet,
        handler: Middleware,
        position: Position,
        role: Role,
    ) -> MiddlewareId {
        self.next_middleware += 1;
        let id = MiddlewareId(self.next_middleware);
        let entry = MiddlewareEntry {
            id,
            scope,
            role,
            handler,
        };
        match position {
            Position::Append => self.middleware.push(entry),
            Position::Prepend => self.middleware.insert(0, entry),
        }
        id
    }

    /// Removes a middleware. Returns whether it was registered.
    pub fn remove_middleware(&mut self, id: MiddlewareId) -> bool {
        let before = self.middleware.len();
        self.middleware.retain(|e| e.id != id);
        self.middleware.len() != before
    }

    /// Drops every middleware except the built-in preprocessor.
    pub fn clear_middleware(&mut self) {
        self.middleware.retain(|e| e.role == Role::Preprocessor);
    }
}
