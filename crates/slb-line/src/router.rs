use std::sync::Arc;

use axum::{routing::post, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use slb_core::{audit::AuditLogger, bot::ShoppingListBot, config::Config};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<ShoppingListBot>,
    pub audit: Arc<AuditLogger>,
}

/// Webhook router. Anything other than POST on `webhook_path` falls through
/// to axum's 404/405.
pub fn app(state: Arc<AppState>, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, post(handlers::handle_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(cfg: Arc<Config>, bot: Arc<ShoppingListBot>) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        bot,
        audit: Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        )),
    });

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", cfg.bind_addr))?;
    info!(
        addr = %cfg.bind_addr,
        path = %cfg.webhook_path,
        audit = %cfg.audit_log_path.display(),
        "shopping list webhook listening"
    );

    axum::serve(listener, app(state, &cfg.webhook_path))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode};
    use std::sync::Mutex;

    use slb_core::{
        domain::{ReplyToken, UserId},
        engine::{ShoppingListEngine, DEFAULT_SHARE_CODE_TTL},
        messages,
        messaging::{port::MessagingPort, types::MessagingCapabilities},
        store::ListStore,
        Result,
    };

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
                .push((reply_token.as_str().to_string(), texts.to_vec()));
            Ok(())
        }

        async fn send_push(&self, to: &UserId, text: &str) -> Result<()> {
            self.pushes
                .lock()
                .unwrap()
                .push((to.as_str().to_string(), text.to_string()));
            Ok(())
        }
    }

    fn audit_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("slb-router-{tag}-{}.log", std::process::id()))
    }

    async fn state_with_store(
        store: ListStore,
        audit: std::path::PathBuf,
    ) -> (Arc<AppState>, Arc<FakeMessenger>) {
        let messenger = Arc::new(FakeMessenger::default());
        let bot = ShoppingListBot::new(
            ShoppingListEngine::new(store, DEFAULT_SHARE_CODE_TTL),
            messenger.clone(),
        );
        let state = Arc::new(AppState {
            bot: Arc::new(bot),
            audit: Arc::new(AuditLogger::new(audit, true)),
        });
        (state, messenger)
    }

    async fn state(tag: &str) -> (Arc<AppState>, Arc<FakeMessenger>) {
        let path = audit_path(tag);
        let _ = std::fs::remove_file(&path);
        state_with_store(ListStore::in_memory().await.unwrap(), path).await
    }

    fn text_event(token: &str, user: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "message",
            "replyToken": token,
            "source": { "type": "user", "userId": user },
            "message": { "id": "1", "type": "text", "text": text }
        })
    }

    #[tokio::test]
    async fn text_events_are_answered_in_order() {
        let (state, messenger) = state("order").await;
        let body = serde_json::json!({
            "destination": "Ubot",
            "events": [
                text_event("r-1", "U1", "牛乳"),
                text_event("r-2", "U1", "リスト"),
            ]
        })
        .to_string();

        let (status, _) = handlers::handle_webhook(State(state.clone()), body).await;
        assert_eq!(status, StatusCode::OK);

        let replies = messenger.replies.lock().unwrap().clone();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].0, "r-1");
        assert_eq!(replies[0].1, vec![messages::item_added("牛乳")]);
        assert_eq!(replies[1].0, "r-2");
        assert_eq!(replies[1].1, vec!["#1 牛乳".to_string()]);
        assert!(messenger.pushes.lock().unwrap().is_empty());

        let _ = std::fs::remove_file(state.audit.path());
    }

    #[tokio::test]
    async fn unrelated_body_is_acknowledged_and_audited() {
        let (state, messenger) = state("unrelated").await;

        let (status, _) = handlers::handle_webhook(State(state.clone()), r#"{"id":123}"#.into()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(messenger.replies.lock().unwrap().is_empty());

        let logged = std::fs::read_to_string(state.audit.path()).unwrap();
        assert!(logged.contains("inbound"));
        assert!(logged.contains("123"));

        let _ = std::fs::remove_file(state.audit.path());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (state, messenger) = state("malformed").await;

        let (status, _) = handlers::handle_webhook(State(state.clone()), "{".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(messenger.replies.lock().unwrap().is_empty());

        let _ = std::fs::remove_file(state.audit.path());
    }

    #[tokio::test]
    async fn processing_failure_is_acknowledged_even_without_audit_log() {
        let store = ListStore::in_memory().await.unwrap();
        store.pool().close().await;
        // A directory cannot be opened for appending.
        let (state, messenger) = state_with_store(store, std::env::temp_dir()).await;

        let body = serde_json::json!({ "events": [text_event("r-1", "U1", "牛乳")] }).to_string();
        let (status, _) = handlers::handle_webhook(State(state), body).await;

        assert_eq!(status, StatusCode::OK);
        assert!(messenger.replies.lock().unwrap().is_empty());
        assert!(messenger.pushes.lock().unwrap().is_empty());
    }
}
