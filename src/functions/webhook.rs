use forge::prelude::*;
use sqlx::PgPool;

use crate::services::{ReconcileOutcome, WebhookEvent, handle_event};

/// Push path. HeyGen only needs an acknowledgement, so every JSON payload
/// is answered with `200 OK` whatever happens to the update.
#[forge::webhook(path = "/webhooks/heygen", allow_unsigned, timeout = "30s")]
pub async fn heygen_callback(
    ctx: &WebhookContext,
    payload: serde_json::Value,
) -> Result<WebhookResult> {
    apply_heygen_event(ctx.db(), payload).await;
    Ok(WebhookResult::Ok)
}

pub async fn apply_heygen_event(
    db: &PgPool,
    payload: serde_json::Value,
) -> Option<ReconcileOutcome> {
    let event: WebhookEvent = match serde_json::from_value(payload.clone()) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, body = %payload, "malformed HeyGen webhook");
            return None;
        }
    };

    tracing::info!(
        event_type = %event.event_type,
        video_id = ?event.event_data.video_id,
        "received HeyGen webhook"
    );

    match handle_event(db, &event).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                error = %e,
                event_type = %event.event_type,
                "failed to apply HeyGen webhook"
            );
            None
        }
    }
}
