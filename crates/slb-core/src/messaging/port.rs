use async_trait::async_trait;

use crate::{
    domain::{ReplyToken, UserId},
    messaging::types::MessagingCapabilities,
    Result,
};

/// Outbound port to the messaging platform.
///
/// Credentials (channel token, endpoints) belong to the implementation.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// Answer an inbound message. A reply token is valid for one call only,
    /// so every reply text of a command is sent in this single call.
    async fn send_reply(&self, reply_token: &ReplyToken, texts: &[String]) -> Result<()>;

    async fn send_push(&self, to: &UserId, text: &str) -> Result<()>;
}
