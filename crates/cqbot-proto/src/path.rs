//! Hierarchical event paths.
//!
//! Every inbound event is classified into an [`EventPath`]: an optional
//! conversation [`Target`] followed by the event segments. Displayed, a
//! path reads like `/group/10000/message/normal` or, for events without a
//! conversation, `/notice/friend_add`.

use std::fmt;
use std::str::FromStr;

/// The kind of conversation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ContextKind {
    /// A one-to-one conversation with a user.
    User,
    /// A group chat.
    Group,
    /// A discussion (ad-hoc multi-user chat).
    Discuss,
}

impl ContextKind {
    /// All kinds, in axis order.
    pub const ALL: [ContextKind; 3] = [ContextKind::User, ContextKind::Group, ContextKind::Discuss];

    /// The path segment for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::User => "user",
            ContextKind::Group => "group",
            ContextKind::Discuss => "discuss",
        }
    }

    /// Single-letter tag used to key per-conversation state.
    pub fn tag(self) -> char {
        match self {
            ContextKind::User => 'p',
            ContextKind::Group => 'g',
            ContextKind::Discuss => 'd',
        }
    }

    /// Whether more than one user can speak in this kind of conversation.
    pub fn is_multi_user(self) -> bool {
        !matches!(self, ContextKind::User)
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" | "private" => Ok(ContextKind::User),
            "group" => Ok(ContextKind::Group),
            "discuss" => Ok(ContextKind::Discuss),
            _ => Err(()),
        }
    }
}

/// A concrete conversation: a kind and an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    /// Conversation kind.
    pub kind: ContextKind,
    /// User, group or discussion id.
    pub id: i64,
}

impl Target {
    /// Creates a target.
    pub fn new(kind: ContextKind, id: i64) -> Self {
        Self { kind, id }
    }

    /// A compact key such as `g10000`.
    pub fn key(&self) -> String {
        format!("{}{}", self.kind.tag(), self.id)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// The canonical path of an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventPath {
    /// Conversation the event happened in, if any.
    pub target: Option<Target>,
    /// Event segments, most general first (`["message", "normal"]`).
    pub segments: Vec<String>,
}

impl EventPath {
    /// Builds a path, dropping empty segments.
    pub fn new<I, S>(target: Option<Target>, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
        Self { target, segments }
    }

    /// Progressive event names, one per segment depth.
    ///
    /// ```
    /// use cqbot_proto::{ContextKind, EventPath, Target};
    ///
    /// let path = EventPath::new(Some(Target::new(ContextKind::Group, 1)), ["message", "normal"]);
    /// assert_eq!(path.event_names(), vec!["message", "message/normal"]);
    /// ```
    pub fn event_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.segments.len());
        let mut current = String::new();
        for segment in &self.segments {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            names.push(current.clone());
        }
        names
    }

    /// The first segment (`message`, `notice`, `request`, `meta_event`, `send`).
    pub fn head(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }
}

impl fmt::Display for EventPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(target) = &self.target {
            write!(f, "/{}", target)?;
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_targeted() {
        let path = EventPath::new(
            Some(Target::new(ContextKind::Group, 10000)),
            ["message", "normal"],
        );
        assert_eq!(path.to_string(), "/group/10000/message/normal");
    }

    #[test]
    fn test_display_contextless() {
        let path = EventPath::new(None, ["notice", "friend_add", ""]);
        assert_eq!(path.to_string(), "/notice/friend_add");
        assert_eq!(path.event_names(), vec!["notice", "notice/friend_add"]);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("private".parse(), Ok(ContextKind::User));
        assert_eq!("discuss".parse(), Ok(ContextKind::Discuss));
        assert!("channel".parse::<ContextKind>().is_err());
    }

    #[test]
    fn test_target_key() {
        assert_eq!(Target::new(ContextKind::Discuss, 5).key(), "d5");
    }
}
