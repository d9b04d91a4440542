//! Typed wrappers over gateway API actions.
//!
//! [`GatewayApi`] is implemented for every [`Sender`], including
//! `dyn Sender`, so `session.sender().set_group_kick(..)` works wherever a
//! sender is at hand.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

use super::sender::{SendError, Sender};

/// Default length of [`GatewayApi::set_group_ban`] when the caller has no
/// preference.
pub const DEFAULT_BAN: Duration = Duration::from_secs(36 * 60);

/// Which kind of group request a flag answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRequestKind {
    /// Someone asked to join.
    Add,
    /// The bot was invited.
    Invite,
}

impl GroupRequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupRequestKind::Add => "add",
            GroupRequestKind::Invite => "invite",
        }
    }

    /// Parses a request event's `sub_type`.
    pub fn parse(sub_type: &str) -> Option<Self> {
        match sub_type {
            "add" => Some(GroupRequestKind::Add),
            "invite" => Some(GroupRequestKind::Invite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginInfo {
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StrangerInfo {
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub age: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FriendInfo {
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupInfo {
    pub group_id: i64,
    #[serde(default)]
    pub group_name: String,
}

/// A group member as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupMemberInfo {
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub age: i64,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub join_time: i64,
    #[serde(default)]
    pub last_sent_time: i64,
    #[serde(default)]
    pub level: String,
    /// `owner`, `admin` or `member`.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub unfriendly: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub title_expire_time: i64,
    #[serde(default)]
    pub card_changeable: bool,
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, SendError> {
    Ok(serde_json::from_value(data)?)
}

/// Group moderation, request handling and account queries.
#[async_trait]
pub trait GatewayApi: Sender {
    async fn delete_msg(&self, message_id: i64) -> Result<(), SendError> {
        self.call("delete_msg", json!({ "message_id": message_id })).await?;
        Ok(())
    }

    async fn send_like(&self, user_id: i64, times: u32) -> Result<(), SendError> {
        self.call("send_like", json!({ "user_id": user_id, "times": times })).await?;
        Ok(())
    }

    async fn set_group_kick(
        &self,
        group_id: i64,
        user_id: i64,
        reject_add_request: bool,
    ) -> Result<(), SendError> {
        let params = json!({
            "group_id": group_id,
            "user_id": user_id,
            "reject_add_request": reject_add_request,
        });
        self.call("set_group_kick", params).await?;
        Ok(())
    }

    /// Mutes a member; a zero duration lifts the ban.
    async fn set_group_ban(&self, group_id: i64, user_id: i64, duration: Duration) -> Result<(), SendError> {
        let params = json!({
            "group_id": group_id,
            "user_id": user_id,
            "duration": duration.as_secs(),
        });
        self.call("set_group_ban", params).await?;
        Ok(())
    }

    async fn set_group_anonymous_ban(
        &self,
        group_id: i64,
        flag: &str,
        duration: Duration,
    ) -> Result<(), SendError> {
        let params = json!({
            "group_id": group_id,
            "flag": flag,
            "duration": duration.as_secs(),
        });
        self.call("set_group_anonymous_ban", params).await?;
        Ok(())
    }

    async fn set_group_whole_ban(&self, group_id: i64, enable: bool) -> Result<(), SendError> {
        self.call("set_group_whole_ban", json!({ "group_id": group_id, "enable": enable }))
            .await?;
        Ok(())
    }

    async fn set_group_admin(&self, group_id: i64, user_id: i64, enable: bool) -> Result<(), SendError> {
        let params = json!({ "group_id": group_id, "user_id": user_id, "enable": enable });
        self.call("set_group_admin", params).await?;
        Ok(())
    }

    async fn set_group_anonymous(&self, group_id: i64, enable: bool) -> Result<(), SendError> {
        self.call("set_group_anonymous", json!({ "group_id": group_id, "enable": enable }))
            .await?;
        Ok(())
    }

    /// Sets a member's group card; an empty card clears it.
    async fn set_group_card(&self, group_id: i64, user_id: i64, card: &str) -> Result<(), SendError> {
        let params = json!({ "group_id": group_id, "user_id": user_id, "card": card });
        self.call("set_group_card", params).await?;
        Ok(())
    }

    /// Leaves a group, dismissing it when `is_dismiss` and the bot owns it.
    async fn set_group_leave(&self, group_id: i64, is_dismiss: bool) -> Result<(), SendError> {
        self.call("set_group_leave", json!({ "group_id": group_id, "is_dismiss": is_dismiss }))
            .await?;
        Ok(())
    }

    /// Grants a special title; `None` keeps it forever.
    async fn set_group_special_title(
        &self,
        group_id: i64,
        user_id: i64,
        title: &str,
        duration: Option<Duration>,
    ) -> Result<(), SendError> {
        let duration = duration.map_or(-1, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));
        let params = json!({
            "group_id": group_id,
            "user_id": user_id,
            "special_title": title,
            "duration": duration,
        });
        self.call("set_group_special_title", params).await?;
        Ok(())
    }

    async fn set_discuss_leave(&self, discuss_id: i64) -> Result<(), SendError> {
        self.call("set_discuss_leave", json!({ "discuss_id": discuss_id })).await?;
        Ok(())
    }

    /// Answers a friend request identified by its `flag`.
    async fn set_friend_add_request(&self, flag: &str, approve: bool, remark: &str) -> Result<(), SendError> {
        let params = json!({ "flag": flag, "approve": approve, "remark": remark });
        self.call("set_friend_add_request", params).await?;
        Ok(())
    }

    /// Answers a join request or invitation. `reason` is shown on rejection.
    async fn set_group_add_request(
        &self,
        flag: &str,
        kind: GroupRequestKind,
        approve: bool,
        reason: &str,
    ) -> Result<(), SendError> {
        let params = json!({
            "flag": flag,
            "type": kind.as_str(),
            "approve": approve,
            "reason": reason,
        });
        self.call("set_group_add_request", params).await?;
        Ok(())
    }

    async fn get_login_info(&self) -> Result<LoginInfo, SendError> {
        decode(self.call("get_login_info", json!({})).await?)
    }

    async fn get_stranger_info(&self, user_id: i64, no_cache: bool) -> Result<StrangerInfo, SendError> {
        let data = self
            .call("get_stranger_info", json!({ "user_id": user_id, "no_cache": no_cache }))
            .await?;
        decode(data)
    }

    async fn get_friend_list(&self) -> Result<Vec<FriendInfo>, SendError> {
        decode(self.call("get_friend_list", json!({})).await?)
    }

    async fn get_group_list(&self) -> Result<Vec<GroupInfo>, SendError> {
        decode(self.call("get_group_list", json!({})).await?)
    }

    async fn get_group_info(&self, group_id: i64, no_cache: bool) -> Result<GroupInfo, SendError> {
        let data = self
            .call("get_group_info", json!({ "group_id": group_id, "no_cache": no_cache }))
            .await?;
        decode(data)
    }

    async fn get_group_member_info(
        &self,
        group_id: i64,
        user_id: i64,
        no_cache: bool,
    ) -> Result<GroupMemberInfo, SendError> {
        let params = json!({ "group_id": group_id, "user_id": user_id, "no_cache": no_cache });
        decode(self.call("get_group_member_info", params).await?)
    }

    async fn get_group_member_list(&self, group_id: i64) -> Result<Vec<GroupMemberInfo>, SendError> {
        decode(self.call("get_group_member_list", json!({ "group_id": group_id })).await?)
    }

    /// Raw gateway status object.
    async fn get_status(&self) -> Result<Value, SendError> {
        self.call("get_status", json!({})).await
    }

    async fn get_version_info(&self) -> Result<Value, SendError> {
        self.call("get_version_info", json!({})).await
    }
}

impl<S: Sender + ?Sized> GatewayApi for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Answers every call with `reply` and keeps what was asked.
    struct Canned {
        reply: Value,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl Canned {
        fn new(reply: Value) -> Self {
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> (String, Value) {
            self.calls.lock().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Sender for Canned {
        async fn call(&self, action: &str, params: Value) -> Result<Value, SendError> {
            self.calls.lock().push((action.to_string(), params));
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_ban_durations() {
        let api = Canned::new(Value::Null);
        api.set_group_ban(1, 2, DEFAULT_BAN).await.unwrap();
        assert_eq!(
            api.last(),
            (
                "set_group_ban".to_string(),
                json!({ "group_id": 1, "user_id": 2, "duration": 2160 })
            )
        );

        api.set_group_special_title(1, 2, "elder", None).await.unwrap();
        assert_eq!(api.last().1["duration"], -1);
    }

    #[tokio::test]
    async fn test_group_request_params() {
        let api = Canned::new(Value::Null);
        let kind = GroupRequestKind::parse("invite").unwrap();
        api.set_group_add_request("abc", kind, false, "no bots").await.unwrap();
        assert_eq!(
            api.last().1,
            json!({ "flag": "abc", "type": "invite", "approve": false, "reason": "no bots" })
        );
        assert_eq!(GroupRequestKind::parse("kick"), None);
    }

    #[tokio::test]
    async fn test_member_info_decoding() {
        let api = Canned::new(json!({
            "group_id": 10,
            "user_id": 20,
            "nickname": "alice",
            "card": "",
            "role": "admin",
            "join_time": 1500000000,
        }));
        let member = api.get_group_member_info(10, 20, true).await.unwrap();
        assert_eq!(member.role, "admin");
        assert_eq!(member.join_time, 1500000000);
        assert!(!member.unfriendly);
        assert_eq!(api.last().1["no_cache"], true);
    }

    #[tokio::test]
    async fn test_unexpected_shape() {
        let api = Canned::new(json!("nope"));
        let err = api.get_login_info().await.unwrap_err();
        assert!(matches!(err, SendError::Decode(_)));
    }

    #[tokio::test]
    async fn test_dyn_sender() {
        let api: std::sync::Arc<dyn Sender> = std::sync::Arc::new(Canned::new(json!([
            { "group_id": 1, "group_name": "a" },
            { "group_id": 2 },
        ])));
        let groups = api.get_group_list().await.unwrap();
        assert_eq!(groups[1], GroupInfo { group_id: 2, group_name: String::new() });
    }
}
