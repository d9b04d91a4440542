//! Gateway event model.
//!
//! Events arrive as JSON objects tagged by `post_type`. Decoding goes
//! through [`Event::from_slice`] / [`Event::from_value`], which also checks
//! that message events carry the id their conversation kind needs.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::path::{ContextKind, EventPath, Target};

/// An inbound (or synthetic outbound) gateway event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "post_type", rename_all = "snake_case")]
pub enum Event {
    /// A chat message.
    Message(MessageEvent),
    /// A notice (member joined, file uploaded, ...).
    Notice(NoticeEvent),
    /// A friend or group request.
    Request(RequestEvent),
    /// Gateway lifecycle and heartbeat events.
    MetaEvent(MetaEvent),
    /// Synthetic event recorded after the bot sent a message.
    Send(SendEvent),
}

/// Kind of conversation a message was posted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// One-to-one.
    Private,
    /// Group chat.
    Group,
    /// Discussion.
    Discuss,
}

impl From<MessageKind> for ContextKind {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Private => ContextKind::User,
            MessageKind::Group => ContextKind::Group,
            MessageKind::Discuss => ContextKind::Discuss,
        }
    }
}

/// Sender details attached to message events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    /// Account id.
    #[serde(default)]
    pub user_id: i64,
    /// Account nickname.
    #[serde(default)]
    pub nickname: String,
    /// Group card (display name inside the group).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
    /// Group role (`owner`, `admin`, `member`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Conversation kind.
    pub message_type: MessageKind,
    /// Subtype (`friend`, `normal`, `anonymous`, ...).
    #[serde(default)]
    pub sub_type: String,
    /// Gateway message id.
    #[serde(default)]
    pub message_id: i64,
    /// Author.
    pub user_id: i64,
    /// Group id for group messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    /// Discussion id for discussion messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discuss_id: Option<i64>,
    /// Message text (CQ-coded).
    pub message: String,
    /// Sender details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    /// Id of the receiving bot account.
    #[serde(default)]
    pub self_id: i64,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub time: i64,
}

impl MessageEvent {
    /// The conversation this message was posted in.
    pub fn target(&self) -> Option<Target> {
        let id = match self.message_type {
            MessageKind::Private => Some(self.user_id),
            MessageKind::Group => self.group_id,
            MessageKind::Discuss => self.discuss_id,
        }?;
        Some(Target::new(self.message_type.into(), id))
    }
}

/// A notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeEvent {
    /// Notice type (`group_increase`, `group_admin`, `friend_add`, ...).
    pub notice_type: String,
    /// Subtype.
    #[serde(default)]
    pub sub_type: String,
    /// Group the notice concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    /// Affected user.
    #[serde(default)]
    pub user_id: i64,
    /// Acting user, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<i64>,
    /// Id of the receiving bot account.
    #[serde(default)]
    pub self_id: i64,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub time: i64,
}

/// A friend or group request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    /// Request type (`friend`, `group`).
    pub request_type: String,
    /// Subtype (`add`, `invite`).
    #[serde(default)]
    pub sub_type: String,
    /// Group the request concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    /// Requesting user.
    #[serde(default)]
    pub user_id: i64,
    /// Verification message.
    #[serde(default)]
    pub comment: String,
    /// Opaque token used to answer the request.
    #[serde(default)]
    pub flag: String,
    /// Id of the receiving bot account.
    #[serde(default)]
    pub self_id: i64,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub time: i64,
}

/// Gateway lifecycle or heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaEvent {
    /// `lifecycle` or `heartbeat`.
    pub meta_event_type: String,
    /// Subtype (`enable`, `disable`, `connect`).
    #[serde(default)]
    pub sub_type: String,
    /// Id of the receiving bot account.
    #[serde(default)]
    pub self_id: i64,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub time: i64,
}

/// A message the bot itself sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendEvent {
    /// Conversation kind the message went to.
    pub send_type: ContextKind,
    /// Conversation id.
    pub target_id: i64,
    /// Gateway message id, when the gateway returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    /// Sent text.
    pub message: String,
    /// Id of the sending bot account.
    #[serde(default)]
    pub self_id: i64,
}

impl Event {
    /// Decodes an event from raw JSON bytes.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let event: Event = serde_json::from_slice(raw)?;
        event.validate()
    }

    /// Decodes an event from a JSON value.
    pub fn from_value(raw: serde_json::Value) -> Result<Self> {
        let event: Event = serde_json::from_value(raw)?;
        event.validate()
    }

    fn validate(self) -> Result<Self> {
        if let Event::Message(message) = &self {
            match message.message_type {
                MessageKind::Group if message.group_id.is_none() => {
                    return Err(ProtocolError::MissingField("group_id", "message"));
                }
                MessageKind::Discuss if message.discuss_id.is_none() => {
                    return Err(ProtocolError::MissingField("discuss_id", "message"));
                }
                _ => {}
            }
        }
        Ok(self)
    }

    /// The `post_type` tag.
    pub fn post_type(&self) -> &'static str {
        match self {
            Event::Message(_) => "message",
            Event::Notice(_) => "notice",
            Event::Request(_) => "request",
            Event::MetaEvent(_) => "meta_event",
            Event::Send(_) => "send",
        }
    }

    /// The conversation the event belongs to, if any.
    ///
    /// Notices and requests belong to a conversation only when they
    /// concern a group.
    pub fn target(&self) -> Option<Target> {
        match self {
            Event::Message(message) => message.target(),
            Event::Notice(notice) => notice.group_id.map(|id| Target::new(ContextKind::Group, id)),
            Event::Request(request) => request.group_id.map(|id| Target::new(ContextKind::Group, id)),
            Event::MetaEvent(_) => None,
            Event::Send(send) => Some(Target::new(send.send_type, send.target_id)),
        }
    }

    /// The acting user, when the event has one.
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Event::Message(message) => Some(message.user_id),
            Event::Notice(notice) => Some(notice.user_id).filter(|&id| id != 0),
            Event::Request(request) => Some(request.user_id).filter(|&id| id != 0),
            Event::MetaEvent(_) | Event::Send(_) => None,
        }
    }

    /// Builds the canonical path of this event.
    ///
    /// ```
    /// use cqbot_proto::Event;
    ///
    /// let event = Event::from_value(serde_json::json!({
    ///     "post_type": "notice",
    ///     "notice_type": "group_increase",
    ///     "sub_type": "approve",
    ///     "group_id": 123,
    ///     "user_id": 456,
    /// })).unwrap();
    /// assert_eq!(event.path().to_string(), "/group/123/group_increase/approve");
    /// ```
    pub fn path(&self) -> EventPath {
        let target = self.target();
        match self {
            Event::Message(message) => {
                EventPath::new(target, ["message", message.sub_type.as_str()])
            }
            Event::Notice(notice) if target.is_some() => {
                EventPath::new(target, [notice.notice_type.as_str(), notice.sub_type.as_str()])
            }
            Event::Notice(notice) => EventPath::new(
                None,
                ["notice", notice.notice_type.as_str(), notice.sub_type.as_str()],
            ),
            Event::Request(request) if target.is_some() => EventPath::new(
                target,
                [request.request_type.as_str(), request.sub_type.as_str()],
            ),
            Event::Request(request) => EventPath::new(
                None,
                ["request", request.request_type.as_str(), request.sub_type.as_str()],
            ),
            Event::MetaEvent(meta) => EventPath::new(
                None,
                ["meta_event", meta.meta_event_type.as_str(), meta.sub_type.as_str()],
            ),
            Event::Send(_) => EventPath::new(target, ["send"]),
        }
    }
}
