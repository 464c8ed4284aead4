//! LINE webhook payload.
//!
//! Only the fields the bot reads are modelled; everything else is ignored.

use serde::Deserialize;

use slb_core::domain::{ReplyToken, UserId};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub source: Option<EventSource>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A text message event with everything needed to answer it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextEvent {
    pub reply_token: ReplyToken,
    pub user: UserId,
    pub text: String,
}

impl WebhookEvent {
    pub fn as_text(&self) -> Option<TextEvent> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.kind != "text" {
            return None;
        }
        let text = message.text.clone()?;
        let user = self.source.as_ref()?.user_id.clone()?;
        let reply_token = self.reply_token.clone()?;
        Some(TextEvent {
            reply_token: ReplyToken::new(reply_token),
            user: UserId::new(user),
            text,
        })
    }
}

impl WebhookEnvelope {
    pub fn parse(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// Text message events in delivery order.
    pub fn text_events(&self) -> Vec<TextEvent> {
        self.events.iter().filter_map(WebhookEvent::as_text).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "destination": "Uxxxxxxxx",
        "events": [
            {
                "type": "message",
                "replyToken": "r-1",
                "source": { "type": "user", "userId": "U123" },
                "timestamp": 1700000000000,
                "message": { "id": "1", "type": "text", "text": "牛乳" }
            },
            {
                "type": "message",
                "replyToken": "r-2",
                "source": { "type": "user", "userId": "U123" },
                "message": { "id": "2", "type": "sticker", "packageId": "1", "stickerId": "1" }
            },
            {
                "type": "follow",
                "replyToken": "r-3",
                "source": { "type": "user", "userId": "U456" }
            },
            {
                "type": "message",
                "replyToken": "r-4",
                "source": { "type": "user", "userId": "U456" },
                "message": { "id": "3", "type": "text", "text": "リスト" }
            }
        ]
    }"#;

    #[test]
    fn extracts_only_text_messages() {
        let env = WebhookEnvelope::parse(SAMPLE).unwrap();
        assert_eq!(env.destination.as_deref(), Some("Uxxxxxxxx"));
        assert_eq!(env.events.len(), 4);

        let texts = env.text_events();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].reply_token, ReplyToken::new("r-1"));
        assert_eq!(texts[0].user, UserId::new("U123"));
        assert_eq!(texts[0].text, "牛乳");
        assert_eq!(texts[1].text, "リスト");
    }

    #[test]
    fn body_without_events_is_empty() {
        let env = WebhookEnvelope::parse(r#"{"id": 123}"#).unwrap();
        assert!(env.text_events().is_empty());
    }

    #[test]
    fn text_event_without_user_is_skipped() {
        let body = r#"{"events":[{"type":"message","replyToken":"r","source":{"type":"group","groupId":"G1"},"message":{"type":"text","text":"x"}}]}"#;
        let env = WebhookEnvelope::parse(body).unwrap();
        assert!(env.text_events().is_empty());
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(WebhookEnvelope::parse("not json").is_err());
    }
}
