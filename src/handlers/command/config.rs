//! Per-command policy configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::state::ObservedRecord;

/// A policy value that is either fixed or computed from the caller's
/// user record.
#[derive(Clone)]
pub enum PerUser<T> {
    Fixed(T),
    Computed(Arc<dyn Fn(&ObservedRecord) -> T + Send + Sync>),
}

impl<T: Clone> PerUser<T> {
    /// Wraps a closure.
    pub fn computed(f: impl Fn(&ObservedRecord) -> T + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }

    /// The value for `user`.
    pub fn resolve(&self, user: &ObservedRecord) -> T {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::Computed(f) => f(user),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PerUser<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<T> From<T> for PerUser<T> {
    fn from(value: T) -> Self {
        Self::Fixed(value)
    }
}

/// Policy configuration of a command.
///
/// Every field is optional so that registering the same command again can
/// merge in just the fields it sets.
#[derive(Debug, Clone, Default)]
pub struct CommandConfig {
    /// One-line help text.
    pub description: Option<String>,
    /// Minimum authority (default 1).
    pub authority: Option<i64>,
    /// Reply sent instead of the generic low-authority message.
    pub authority_hint: Option<String>,
    /// Left out of the command list in help.
    pub hidden: Option<bool>,
    /// Billable invocations allowed per day (unlimited when unset).
    pub max_usage: Option<PerUser<u64>>,
    /// Reply sent instead of the generic usage-exhausted message.
    pub max_usage_text: Option<String>,
    /// Minimum time between invocations.
    pub min_interval: Option<PerUser<Duration>>,
    /// Reply when called again within `min_interval` (default: stay silent).
    pub show_warning: Option<bool>,
    /// Usage bucket shared between commands (defaults to the command name).
    pub usage_name: Option<String>,
    /// Reject unknown options.
    pub check_unknown: Option<bool>,
    /// Reject when a required-parameter option is missing.
    pub check_required: Option<bool>,
    /// Reject missing or surplus positional arguments.
    pub check_arg_count: Option<bool>,
}

impl CommandConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides every field `other` sets.
    pub fn merge(&mut self, other: CommandConfig) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            description,
            authority,
            authority_hint,
            hidden,
            max_usage,
            max_usage_text,
            min_interval,
            show_warning,
            usage_name,
            check_unknown,
            check_required,
            check_arg_count
        );
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn authority(mut self, authority: i64) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn authority_hint(mut self, text: impl Into<String>) -> Self {
        self.authority_hint = Some(text.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn max_usage(mut self, max: impl Into<PerUser<u64>>) -> Self {
        self.max_usage = Some(max.into());
        self
    }

    pub fn max_usage_text(mut self, text: impl Into<String>) -> Self {
        self.max_usage_text = Some(text.into());
        self
    }

    pub fn min_interval(mut self, interval: impl Into<PerUser<Duration>>) -> Self {
        self.min_interval = Some(interval.into());
        self
    }

    pub fn show_warning(mut self, show: bool) -> Self {
        self.show_warning = Some(show);
        self
    }

    pub fn usage_name(mut self, name: impl Into<String>) -> Self {
        self.usage_name = Some(name.into());
        self
    }

    pub fn check_unknown(mut self, check: bool) -> Self {
        self.check_unknown = Some(check);
        self
    }

    pub fn check_required(mut self, check: bool) -> Self {
        self.check_required = Some(check);
        self
    }

    pub fn check_arg_count(mut self, check: bool) -> Self {
        self.check_arg_count = Some(check);
        self
    }

    // ------------------------------------------------------------------
    // Resolved values
    // ------------------------------------------------------------------

    pub(crate) fn required_authority(&self) -> i64 {
        self.authority.unwrap_or(1)
    }

    pub(crate) fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }

    pub(crate) fn max_usage_for(&self, user: &ObservedRecord) -> Option<u64> {
        self.max_usage
            .as_ref()
            .map(|max| max.resolve(user))
            .filter(|&max| max != u64::MAX)
    }

    pub(crate) fn min_interval_for(&self, user: &ObservedRecord) -> Duration {
        self.min_interval
            .as_ref()
            .map_or(Duration::ZERO, |interval| interval.resolve(user))
    }
}
