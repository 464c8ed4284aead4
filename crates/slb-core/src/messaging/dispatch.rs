use tracing::warn;

use crate::{
    domain::ReplyToken,
    messaging::{port::MessagingPort, types::Outbox},
};

/// Hand an outbox to the messenger.
///
/// The batched reply goes first while the token is fresh, then each push.
/// Delivery failures are logged and dropped: the platform owns retries, the
/// command has already committed.
pub async fn dispatch(messenger: &dyn MessagingPort, reply_token: &ReplyToken, outbox: Outbox) {
    let Outbox { replies, pushes } = outbox;
    let caps = messenger.capabilities();

    if !replies.is_empty() {
        let max = caps.max_reply_messages.max(1);
        let replies = if replies.len() > max {
            warn!(
                count = replies.len(),
                max, "reply exceeds platform batch limit; merging overflow"
            );
            merge_overflow(replies, max)
        } else {
            replies
        };
        let replies: Vec<String> = replies
            .into_iter()
            .map(|t| clamp_text(t, caps.max_message_len))
            .collect();

        if let Err(e) = messenger.send_reply(reply_token, &replies).await {
            warn!(error = %e, "reply delivery failed");
        }
    }

    for push in pushes {
        let text = clamp_text(push.text, caps.max_message_len);
        if let Err(e) = messenger.send_push(&push.to, &text).await {
            warn!(to = %push.to, error = %e, "push delivery failed");
        }
    }
}

/// Fold everything past the first `max - 1` texts into the last message.
fn merge_overflow(mut replies: Vec<String>, max: usize) -> Vec<String> {
    let tail = replies.split_off(max - 1).join("\n");
    replies.push(tail);
    replies
}

/// Cut `text` to at most `max_len` characters.
fn clamp_text(text: String, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text;
    }
    text.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::UserId,
        errors::Error,
        messaging::types::MessagingCapabilities,
        Result,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMessenger {
        replies: Mutex<Vec<(String, Vec<String>)>>,
        pushes: Mutex<Vec<(String, String)>>,
        fail_pushes: bool,
    }

    #[async_trait]
    impl MessagingPort for RecordingMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                max_reply_messages: 2,
                max_message_len: 10,
            }
        }

        async fn send_reply(&self, reply_token: &ReplyToken, texts: &[String]) -> Result<()> {
            self.replies
                .lock()
                .unwrap()
                .push((reply_token.0.clone(), texts.to_vec()));
            Ok(())
        }

        async fn send_push(&self, to: &UserId, text: &str) -> Result<()> {
            if self.fail_pushes {
                return Err(Error::External("push rejected".to_string()));
            }
            self.pushes
                .lock()
                .unwrap()
                .push((to.0.clone(), text.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn replies_are_sent_once_in_order() {
        let m = RecordingMessenger::default();
        let mut out = Outbox::default();
        out.reply("first");
        out.push(&UserId::new("other"), "ping");
        out.reply("second");

        dispatch(&m, &ReplyToken::new("rt"), out).await;

        let replies = m.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "rt");
        assert_eq!(replies[0].1, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(
            *m.pushes.lock().unwrap(),
            vec![("other".to_string(), "ping".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_outbox_sends_nothing() {
        let m = RecordingMessenger::default();
        dispatch(&m, &ReplyToken::new("rt"), Outbox::default()).await;
        assert!(m.replies.lock().unwrap().is_empty());
        assert!(m.pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_failures_are_swallowed() {
        let m = RecordingMessenger {
            fail_pushes: true,
            ..Default::default()
        };
        let mut out = Outbox::default();
        out.push(&UserId::new("a"), "ping");
        out.push(&UserId::new("b"), "ping");
        out.reply("done");

        dispatch(&m, &ReplyToken::new("rt"), out).await;
        assert_eq!(m.replies.lock().unwrap().len(), 1);
        assert!(m.pushes.lock().unwrap().is_empty());
    }

    #[test]
    fn overflow_is_merged_into_last_message() {
        let merged = merge_overflow(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            2,
        );
        assert_eq!(merged, vec!["a".to_string(), "b\nc\nd".to_string()]);
    }

    #[tokio::test]
    async fn long_texts_are_cut_to_platform_limit() {
        let m = RecordingMessenger::default();
        let mut out = Outbox::default();
        out.reply("牛乳".repeat(6));
        out.push(&UserId::new("other"), "0123456789abc");

        dispatch(&m, &ReplyToken::new("rt"), out).await;

        let replies = m.replies.lock().unwrap();
        assert_eq!(replies[0].1, vec!["牛乳".repeat(5)]);
        assert_eq!(
            *m.pushes.lock().unwrap(),
            vec![("other".to_string(), "0123456789".to_string())]
        );
    }
}
