//! Tracing spans and command latency timing.

use std::time::Instant;

/// Measures one command action. The latency is recorded on drop, so an
/// action that fails or panics is still counted.
pub struct CommandTimer {
    name: String,
    started: Instant,
}

impl CommandTimer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        crate::metrics::record_command(&self.name, self.started.elapsed().as_secs_f64());
    }
}

/// Span constructors shared by the dispatcher and the command runner.
pub mod spans {
    use tracing::{Span, info_span};

    /// One dispatched event, keyed by its path (`/group/10000/message/normal`).
    pub fn dispatch(path: &str, user: Option<i64>) -> Span {
        match user {
            Some(user) => info_span!("dispatch", path = %path, user),
            None => info_span!("dispatch", path = %path),
        }
    }

    /// One command action. `target` is the conversation key, e.g. `group:10000`.
    pub fn command(name: &str, user: Option<i64>, target: Option<&str>) -> Span {
        match target {
            Some(target) => info_span!("command", name = %name, user = ?user, target = %target),
            None => info_span!("command", name = %name, user = ?user),
        }
    }
}
