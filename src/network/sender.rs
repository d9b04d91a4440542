//! Outbound gateway calls.
//!
//! Every gateway action is a JSON call through [`Sender::call`]; sending a
//! message is just the most common one. [`HttpSender`] talks to a
//! CQHTTP-style HTTP API, [`LogSender`] just logs what would have been sent.
//! Typed wrappers for the other actions live in [`super::api`].

use async_trait::async_trait;
use cqbot_proto::ContextKind;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the outbound gateway.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{action} returned retcode {retcode}")]
    Retcode { action: String, retcode: i64 },
    #[error("unexpected gateway response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Calls gateway API actions.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Calls `action` with `params` and returns the response `data`,
    /// `null` when the gateway reports none.
    async fn call(&self, action: &str, params: Value) -> Result<Value, SendError>;

    /// Sends `text` to the conversation `(kind, id)`.
    ///
    /// Returns the gateway message id when one is reported.
    async fn send(&self, kind: ContextKind, id: i64, text: &str) -> Result<Option<i64>, SendError> {
        self.send_with(kind, id, text, false).await
    }

    /// Like [`Sender::send`]; with `auto_escape` the gateway delivers CQ
    /// codes as literal text. Empty messages are not sent.
    async fn send_with(
        &self,
        kind: ContextKind,
        id: i64,
        text: &str,
        auto_escape: bool,
    ) -> Result<Option<i64>, SendError> {
        if text.is_empty() {
            return Ok(None);
        }
        let (action, key) = route(kind);
        let data = self
            .call(action, json!({ key: id, "message": text, "auto_escape": auto_escape }))
            .await?;
        Ok(data.get("message_id").and_then(Value::as_i64))
    }
}

/// Response envelope of the gateway HTTP API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Option<Value>,
}

/// Sends through the gateway's HTTP API.
pub struct HttpSender {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSender {
    /// Creates a sender for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, action: &str) -> String {
        format!("{}/{}", self.base_url, action)
    }
}

/// API action and id parameter for a conversation kind.
pub(crate) fn route(kind: ContextKind) -> (&'static str, &'static str) {
    match kind {
        ContextKind::User => ("send_private_msg", "user_id"),
        ContextKind::Group => ("send_group_msg", "group_id"),
        ContextKind::Discuss => ("send_discuss_msg", "discuss_id"),
    }
}

#[async_trait]
impl Sender for HttpSender {
    async fn call(&self, action: &str, params: Value) -> Result<Value, SendError> {
        let mut request = self.client.post(self.url(action)).json(&params);
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Token {}", token));
        }

        let response: ApiResponse = request.send().await?.error_for_status()?.json().await?;
        debug!(action, retcode = response.retcode, "Gateway call finished");

        if response.retcode != 0 {
            return Err(SendError::Retcode {
                action: action.to_string(),
                retcode: response.retcode,
            });
        }
        Ok(response.data.unwrap_or(Value::Null))
    }
}

/// Logs outgoing calls instead of delivering them.
#[derive(Debug, Default)]
pub struct LogSender;

#[async_trait]
impl Sender for LogSender {
    async fn call(&self, action: &str, params: Value) -> Result<Value, SendError> {
        info!(action, %params, "Gateway call (no gateway configured)");
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Sender for Recorder {
        async fn call(&self, action: &str, params: Value) -> Result<Value, SendError> {
            self.calls.lock().push((action.to_string(), params));
            Ok(json!({ "message_id": 7 }))
        }
    }

    #[test]
    fn test_routes() {
        assert_eq!(route(ContextKind::User), ("send_private_msg", "user_id"));
        assert_eq!(route(ContextKind::Group), ("send_group_msg", "group_id"));
        assert_eq!(route(ContextKind::Discuss), ("send_discuss_msg", "discuss_id"));
    }

    #[test]
    fn test_base_url_trimmed() {
        let sender = HttpSender::new("http://127.0.0.1:5700/", None);
        assert_eq!(sender.url("get_status"), "http://127.0.0.1:5700/get_status");
    }

    #[test]
    fn test_api_response_decoding() {
        let response: ApiResponse =
            serde_json::from_str(r#"{"status":"ok","retcode":0,"data":{"message_id":12}}"#).unwrap();
        assert_eq!(response.retcode, 0);
        assert_eq!(response.data.unwrap()["message_id"], 12);

        let response: ApiResponse = serde_json::from_str(r#"{"status":"async","retcode":1}"#).unwrap();
        assert_eq!(response.retcode, 1);
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_send_goes_through_call() {
        let recorder = Recorder::default();
        let id = recorder.send(ContextKind::Discuss, 3, "hi").await.unwrap();
        assert_eq!(id, Some(7));

        let escaped = recorder.send_with(ContextKind::Group, 4, "[CQ:face,id=1]", true).await.unwrap();
        assert_eq!(escaped, Some(7));

        let calls = recorder.calls.lock();
        assert_eq!(calls[0].0, "send_discuss_msg");
        assert_eq!(calls[0].1, json!({ "discuss_id": 3, "message": "hi", "auto_escape": false }));
        assert_eq!(calls[1].0, "send_group_msg");
        assert_eq!(calls[1].1["auto_escape"], true);
    }

    #[tokio::test]
    async fn test_empty_message_not_sent() {
        let recorder = Recorder::default();
        let id = recorder.send(ContextKind::User, 1, "").await.unwrap();
        assert!(id.is_none());
        assert!(recorder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_log_sender() {
        let id = LogSender.send(ContextKind::Group, 1, "hi").await.unwrap();
        assert!(id.is_none());
        assert_eq!(LogSender.call("get_status", json!({})).await.unwrap(), Value::Null);
    }
}
