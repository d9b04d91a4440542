//! Integration tests for gateway API calls made from handlers.

mod common;

use common::{SELF_ID, TestApp};
use cqbot::{GatewayApi, GroupRequestKind, LoginInfo};
use cqbot_proto::Event;
use serde_json::json;
use std::time::Duration;

fn friend_request(user: i64, comment: &str) -> Event {
    Event::from_value(json!({
        "post_type": "request",
        "request_type": "friend",
        "user_id": user,
        "comment": comment,
        "flag": format!("flag-{}", user),
        "self_id": SELF_ID,
    }))
    .expect("friend request")
}

fn group_invite(group: i64, user: i64) -> Event {
    Event::from_value(json!({
        "post_type": "request",
        "request_type": "group",
        "sub_type": "invite",
        "group_id": group,
        "user_id": user,
        "flag": "invite-1",
        "self_id": SELF_ID,
    }))
    .expect("group invite")
}

#[tokio::test]
async fn test_friend_request_approval() {
    let t = TestApp::new();
    t.app.receiver().on("request/friend", |session| async move {
        let Event::Request(request) = session.event() else {
            return Ok(());
        };
        let approve = request.comment == "let me in";
        session
            .sender()
            .set_friend_add_request(&request.flag, approve, "")
            .await?;
        Ok(())
    });

    t.app.dispatch_event(friend_request(10000, "let me in")).await;
    t.app.dispatch_event(friend_request(10001, "spam")).await;

    assert_eq!(
        t.sender.calls(),
        vec![
            (
                "set_friend_add_request".to_string(),
                json!({ "flag": "flag-10000", "approve": true, "remark": "" })
            ),
            (
                "set_friend_add_request".to_string(),
                json!({ "flag": "flag-10001", "approve": false, "remark": "" })
            ),
        ]
    );
}

#[tokio::test]
async fn test_group_invite_rejected() {
    let t = TestApp::new();
    t.app.receiver().on("group", |session| async move {
        let Event::Request(request) = session.event() else {
            return Ok(());
        };
        let Some(kind) = GroupRequestKind::parse(&request.sub_type) else {
            return Ok(());
        };
        session
            .sender()
            .set_group_add_request(&request.flag, kind, false, "invite only")
            .await?;
        Ok(())
    });

    t.app.dispatch_event(group_invite(20000, 10000)).await;

    let calls = t.sender.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "set_group_add_request");
    assert_eq!(calls[0].1["type"], "invite");
    assert_eq!(calls[0].1["reason"], "invite only");
}

#[tokio::test]
async fn test_moderation_command() {
    let t = TestApp::new();
    t.app
        .groups()
        .command("mute <user>")
        .unwrap()
        .action(|inv| async move {
            let Some(group) = inv.session.target().map(|target| target.id) else {
                return Ok(());
            };
            let Ok(user) = inv.arg(0).parse::<i64>() else {
                return inv.reply("Not a user id.").await;
            };
            inv.session
                .sender()
                .set_group_ban(group, user, Duration::from_secs(600))
                .await?;
            inv.reply("Muted.").await
        });

    t.group(20000, 10000, ".mute 10001").await;

    assert_eq!(t.sender.texts(), vec!["Muted."]);
    assert_eq!(
        t.sender.calls(),
        vec![(
            "set_group_ban".to_string(),
            json!({ "group_id": 20000, "user_id": 10001, "duration": 600 })
        )]
    );
}

#[tokio::test]
async fn test_login_info_from_app() {
    let t = TestApp::new();
    t.sender.respond("get_login_info", json!({ "user_id": SELF_ID, "nickname": "Bot" }));

    let info = t.app.sender().get_login_info().await.unwrap();
    assert_eq!(
        info,
        LoginInfo {
            user_id: SELF_ID,
            nickname: "Bot".to_string(),
        }
    );
}

#[tokio::test]
async fn test_empty_reply_skipped() {
    let t = TestApp::new();
    t.app.command("quiet").unwrap().action(|inv| async move { inv.reply("").await });

    t.private(10000, "quiet").await;
    assert!(t.sender.take().is_empty());
}
