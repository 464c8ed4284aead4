use crate::domain::UserId;

/// Unsolicited message to a user, not tied to an inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Push {
    pub to: UserId,
    pub text: String,
}

/// Everything one command decided to send.
///
/// Replies keep emission order and go out together on the one-shot reply
/// token; pushes go out individually.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outbox {
    pub replies: Vec<String>,
    pub pushes: Vec<Push>,
}

impl Outbox {
    pub fn reply(&mut self, text: impl Into<String>) {
        self.replies.push(text.into());
    }

    pub fn push(&mut self, to: &UserId, text: impl Into<String>) {
        self.pushes.push(Push {
            to: to.clone(),
            text: text.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty() && self.pushes.is_empty()
    }
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    /// Maximum number of messages one reply call may carry.
    pub max_reply_messages: usize,
    /// Maximum characters of one message; longer texts are cut.
    pub max_message_len: usize,
}
