//! LINE Messaging API adapter.
//!
//! Implements the `slb-core` MessagingPort over the reply/push HTTP API and
//! serves the webhook that feeds inbound text messages to the bot.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, StatusCode};
use serde_json::json;
use tokio::time::sleep;
use tracing::warn;

pub mod handlers;
pub mod router;
pub mod webhook;

use slb_core::{
    config::Config,
    domain::{ReplyToken, UserId},
    errors::Error,
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

/// LINE accepts at most five message objects per reply/push call.
pub const MAX_MESSAGES_PER_CALL: usize = 5;
/// Maximum characters of a LINE text message.
pub const MAX_TEXT_LEN: usize = 5000;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct LineMessenger {
    http: reqwest::Client,
    channel_token: String,
    reply_endpoint: String,
    push_endpoint: String,
}

impl LineMessenger {
    pub fn new(
        channel_token: impl Into<String>,
        reply_endpoint: impl Into<String>,
        push_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            channel_token: channel_token.into(),
            reply_endpoint: reply_endpoint.into(),
            push_endpoint: push_endpoint.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.channel_token.clone(),
            cfg.reply_endpoint.clone(),
            cfg.push_endpoint.clone(),
        )
    }

    fn map_err(e: reqwest::Error) -> Error {
        Error::External(format!("line api error: {e}"))
    }

    /// POST `body`, retrying once when the API answers 429.
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<()> {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            let resp = self
                .http
                .post(url)
                .bearer_auth(&self.channel_token)
                .json(body)
                .send()
                .await
                .map_err(Self::map_err)?;

            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }
            if status == StatusCode::TOO_MANY_REQUESTS && attempts < MAX_RETRIES {
                attempts += 1;
                let wait = retry_after(resp.headers().get(RETRY_AFTER));
                warn!(url, wait_ms = wait.as_millis() as u64, "rate limited by line api");
                sleep(wait).await;
                continue;
            }

            let detail = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "line api returned {status}: {detail}"
            )));
        }
    }
}

fn retry_after(header: Option<&reqwest::header::HeaderValue>) -> Duration {
    header
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
        .min(MAX_RETRY_AFTER)
}

fn text_messages(texts: &[String]) -> Vec<serde_json::Value> {
    texts
        .iter()
        .map(|t| json!({ "type": "text", "text": t }))
        .collect()
}

#[async_trait]
impl MessagingPort for LineMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_reply_messages: MAX_MESSAGES_PER_CALL,
            max_message_len: MAX_TEXT_LEN,
        }
    }

    async fn send_reply(&self, reply_token: &ReplyToken, texts: &[String]) -> Result<()> {
        let body = json!({
            "replyToken": reply_token.as_str(),
            "messages": text_messages(texts),
        });
        self.post_json(&self.reply_endpoint, &body).await
    }

    async fn send_push(&self, to: &UserId, text: &str) -> Result<()> {
        let body = json!({
            "to": to.as_str(),
            "messages": text_messages(&[text.to_string()]),
        });
        self.post_json(&self.push_endpoint, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_parses_seconds_with_cap() {
        assert_eq!(
            retry_after(Some(&HeaderValue::from_static("3"))),
            Duration::from_secs(3)
        );
        assert_eq!(
            retry_after(Some(&HeaderValue::from_static("600"))),
            MAX_RETRY_AFTER
        );
        assert_eq!(retry_after(None), DEFAULT_RETRY_AFTER);
        assert_eq!(
            retry_after(Some(&HeaderValue::from_static("soon"))),
            DEFAULT_RETRY_AFTER
        );
    }

    #[test]
    fn messages_are_line_text_objects() {
        let msgs = text_messages(&["a".to_string(), "b".to_string()]);
        assert_eq!(
            serde_json::Value::Array(msgs),
            json!([{ "type": "text", "text": "a" }, { "type": "text", "text": "b" }])
        );
    }
}
