//! Webhook delivery handlers.
//!
//! Every delivery is audit-logged as received. A body that does not parse is
//! rejected with 400; otherwise each text message event is handed to the bot
//! and the platform always gets 200 so it does not redeliver.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::{debug, warn};

use slb_core::audit::AuditEvent;

use crate::router::AppState;
use crate::webhook::WebhookEnvelope;

mod text;

pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    if let Err(e) = state.audit.write(AuditEvent::inbound(&body)) {
        warn!(error = %e, "failed to write audit log");
    }

    let envelope = match WebhookEnvelope::parse(&body) {
        Ok(env) => env,
        Err(e) => {
            warn!(error = %e, "rejecting malformed webhook body");
            return (StatusCode::BAD_REQUEST, Json(json!({})));
        }
    };

    let events = envelope.text_events();
    debug!(
        total = envelope.events.len(),
        text = events.len(),
        "webhook delivery"
    );

    for event in events {
        text::handle_text(&state, event).await;
    }

    (StatusCode::OK, Json(json!({})))
}
