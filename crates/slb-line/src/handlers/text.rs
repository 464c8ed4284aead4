use tracing::{error, warn};

use slb_core::audit::AuditEvent;

use crate::router::AppState;
use crate::webhook::TextEvent;

/// Run one text message through the bot. Failures are logged, never surfaced
/// to the webhook caller.
pub async fn handle_text(state: &AppState, event: TextEvent) {
    let TextEvent {
        reply_token,
        user,
        text,
    } = event;

    if let Err(e) = state.bot.handle(&reply_token, &user, &text).await {
        error!(user = %user, error = %e, "failed to process message");
        let audit = AuditEvent::error(Some(user.as_str()), &e.to_string(), Some(&text));
        if let Err(audit_err) = state.audit.write(audit) {
            warn!(user = %user, error = %audit_err, "failed to write audit log");
        }
    }
}
