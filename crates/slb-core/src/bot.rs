use std::sync::Arc;

use tracing::debug;

use crate::{
    domain::{ReplyToken, UserId},
    engine::ShoppingListEngine,
    locks::UserLocks,
    messaging::{dispatch::dispatch, port::MessagingPort},
    Result,
};

/// Entry point for inbound text messages.
///
/// Serializes per user, runs the command, then hands the outcome to the
/// messenger. Only storage failures are returned.
pub struct ShoppingListBot {
    engine: ShoppingListEngine,
    messenger: Arc<dyn MessagingPort>,
    locks: UserLocks,
}

impl ShoppingListBot {
    pub fn new(engine: ShoppingListEngine, messenger: Arc<dyn MessagingPort>) -> Self {
        Self {
            engine,
            messenger,
            locks: UserLocks::default(),
        }
    }

    pub async fn handle(&self, reply_token: &ReplyToken, user: &UserId, text: &str) -> Result<()> {
        let _guard = self.locks.lock_user(user).await;
        let outbox = self.engine.process(user, text).await?;
        debug!(
            user = %user,
            replies = outbox.replies.len(),
            pushes = outbox.pushes.len(),
            "command processed"
        );
        dispatch(self.messenger.as_ref(), reply_token, outbox).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::DEFAULT_SHARE_CODE_TTL,
        messages,
        messaging::types::MessagingCapabilities,
        store::ListStore,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMessenger {
        replies: Mutex<Vec<(String, Vec<String>)>>,
        pushes: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                max_reply_messages: 5,
                max_message_len: 5000,
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
            self.pushes
                .lock()
                .unwrap()
                .push((to.0.clone(), text.to_string()));
            Ok(())
        }
    }

    async fn bot() -> (ShoppingListBot, Arc<FakeMessenger>) {
        let store = ListStore::in_memory().await.unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let bot = ShoppingListBot::new(
            ShoppingListEngine::new(store, DEFAULT_SHARE_CODE_TTL),
            messenger.clone(),
        );
        (bot, messenger)
    }

    #[tokio::test]
    async fn replies_go_to_the_reply_token() {
        let (bot, m) = bot().await;
        bot.handle(&ReplyToken::new("rt-1"), &UserId::new("u"), "TEST")
            .await
            .unwrap();

        let replies = m.replies.lock().unwrap();
        assert_eq!(
            *replies,
            vec![("rt-1".to_string(), vec!["「TEST」を追加しました。".to_string()])]
        );
    }

    #[tokio::test]
    async fn select_sends_confirmation_then_listing_in_one_reply() {
        let (bot, m) = bot().await;
        bot.handle(&ReplyToken::new("rt"), &UserId::new("u"), "list1 MyGroceries")
            .await
            .unwrap();

        let replies = m.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0].1,
            vec![
                "「リスト1（MyGroceries）」に切替えました".to_string(),
                messages::LIST_EMPTY.to_string()
            ]
        );
    }

    #[tokio::test]
    async fn silent_delete_sends_nothing() {
        let (bot, m) = bot().await;
        bot.handle(&ReplyToken::new("rt"), &UserId::new("u"), "1 2")
            .await
            .unwrap();
        assert!(m.replies.lock().unwrap().is_empty());
        assert!(m.pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn shared_updates_are_pushed_to_the_other_user() {
        let (bot, m) = bot().await;
        bot.handle(&ReplyToken::new("rt"), &UserId::new("a"), "share")
            .await
            .unwrap();
        let code = {
            let replies = m.replies.lock().unwrap();
            replies[0].1[0].lines().last().unwrap().to_string()
        };

        bot.handle(&ReplyToken::new("rt"), &UserId::new("b"), &code)
            .await
            .unwrap();
        bot.handle(&ReplyToken::new("rt"), &UserId::new("b"), "milk")
            .await
            .unwrap();

        assert_eq!(
            *m.pushes.lock().unwrap(),
            vec![("a".to_string(), "リストが更新されました\n#1 milk".to_string())]
        );
    }
}
