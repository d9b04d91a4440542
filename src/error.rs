//! Unified error handling for cqbot.
//!
//! Registration problems, user-facing command rejections, pipeline
//! integrity warnings and handler failures each get their own type, with
//! static codes for metrics labeling.

use thiserror::Error;

use crate::db::DbError;
use crate::network::SendError;

// ============================================================================
// Handler Errors (middleware and command actions)
// ============================================================================

/// Errors that can escape a middleware or command action.
///
/// The pipeline catches these, logs them and counts them; they never reach
/// the gateway.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("send error: {0}")]
    Send(#[from] SendError),

    #[error("storage error: {0}")]
    Db(#[from] DbError),

    #[error("protocol error: {0}")]
    Protocol(#[from] cqbot_proto::ProtocolError),

    #[error("event has no conversation to reply to")]
    NoReplyTarget,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Send(_) => "send_error",
            Self::Db(_) => "db_error",
            Self::Protocol(_) => "protocol_error",
            Self::NoReplyTarget => "no_reply_target",
            Self::Other(_) => "action_error",
        }
    }
}

/// Result type for middleware and actions.
pub type HandlerResult = Result<(), HandlerError>;

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors raised while declaring commands, options and plugins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("duplicate command names: {0}")]
    DuplicateCommand(String),

    #[error("duplicate option names: {0}")]
    DuplicateOption(String),

    #[error("invalid option declaration: {0}")]
    InvalidOption(String),

    #[error("{0} already has a different parent command")]
    WrongSubcommand(String),

    #[error("{0} was registered in a context that does not cover this one")]
    WrongContext(String),

    #[error("invalid command name: {0:?}")]
    InvalidName(String),

    #[error("application state for {0} has been dropped")]
    Detached(String),
}

// ============================================================================
// Rejections (user-facing policy outcomes)
// ============================================================================

/// A command invocation refused by policy.
///
/// Each rejection produces exactly one short reply to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    InsufficientArguments,
    RedundantArguments,
    UnknownOptions(Vec<String>),
    MissingOptions(Vec<String>),
    LowAuthority,
    TooFrequent,
    UsageExhausted,
    CommandNotFound,
}

impl Rejection {
    /// Get a static code string for metrics labeling.
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientArguments => "insufficient_arguments",
            Self::RedundantArguments => "redundant_arguments",
            Self::UnknownOptions(_) => "unknown_options",
            Self::MissingOptions(_) => "missing_options",
            Self::LowAuthority => "low_authority",
            Self::TooFrequent => "too_frequent",
            Self::UsageExhausted => "usage_exhausted",
            Self::CommandNotFound => "command_not_found",
        }
    }

    /// The reply text sent to the user.
    pub fn message(&self) -> String {
        match self {
            Self::InsufficientArguments => "Insufficient arguments.".to_string(),
            Self::RedundantArguments => "Redundant arguments.".to_string(),
            Self::UnknownOptions(names) => format!("Unknown options: {}.", names.join(", ")),
            Self::MissingOptions(names) => format!("Missing options: {}.", names.join(", ")),
            Self::LowAuthority => "Your authority is too low.".to_string(),
            Self::TooFrequent => "Calling too frequently, please wait a moment.".to_string(),
            Self::UsageExhausted => "You have reached today's usage limit.".to_string(),
            Self::CommandNotFound => "Command not found.".to_string(),
        }
    }
}

// ============================================================================
// Pipeline Warnings
// ============================================================================

/// Integrity violations detected by the middleware pipeline.
///
/// These are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineWarning {
    #[error("isolated next function detected in run {run}")]
    IsolatedNext { run: u64 },

    #[error("premiddleware interception in run {run}: {path} never reached the preprocessor")]
    PremiddlewareInterception { run: u64, path: String },
}

impl PipelineWarning {
    /// Get a static code string for metrics labeling.
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IsolatedNext { .. } => "isolated_next",
            Self::PremiddlewareInterception { .. } => "premiddleware_interception",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        let rejection = Rejection::UnknownOptions(vec!["foo".into(), "bar".into()]);
        assert_eq!(rejection.message(), "Unknown options: foo, bar.");
        assert_eq!(rejection.code(), "unknown_options");
        assert_eq!(Rejection::CommandNotFound.message(), "Command not found.");
    }

    #[test]
    fn test_handler_error_codes() {
        let err = HandlerError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.error_code(), "action_error");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_warning_kind() {
        let warning = PipelineWarning::IsolatedNext { run: 3 };
        assert_eq!(warning.kind(), "isolated_next");
        assert!(warning.to_string().contains("run 3"));
    }
}
