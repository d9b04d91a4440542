//! Gateway plumbing: inbound event dispatch and outbound API calls.

mod api;
mod dispatch;
mod sender;

pub(crate) use dispatch::dispatch_event;
pub use api::{
    DEFAULT_BAN, FriendInfo, GatewayApi, GroupInfo, GroupMemberInfo, GroupRequestKind, LoginInfo,
    StrangerInfo,
};
pub use sender::{HttpSender, LogSender, SendError, Sender};
