//! Slack Events API endpoint — signature-validated inbound message stream.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use super::BotRouterState;
use crate::models::message::InboundMessage;
use crate::services::slack_service;

/// `POST /slack/events` — verify the request signature, answer challenges,
/// and forward message events into the bot loop.
pub async fn events_handler(
    State(state): State<BotRouterState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    crate::metrics::webhook_received("slack_events");

    let timestamp = headers
        .get("x-slack-request-timestamp")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let signature = headers
        .get("x-slack-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !slack_service::validate_signature(
        &state.config.slack_signing_secret,
        timestamp,
        &body,
        signature,
    ) {
        tracing::warn!("Slack event signature validation failed");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    match payload["type"].as_str() {
        Some("url_verification") => {
            let challenge = payload["challenge"].as_str().unwrap_or_default().to_string();
            (StatusCode::OK, challenge).into_response()
        }
        Some("event_callback") => {
            forward_event(&state, &payload["event"]).await;
            StatusCode::OK.into_response()
        }
        other => {
            tracing::debug!(event_type = ?other, "ignoring Slack payload");
            StatusCode::OK.into_response()
        }
    }
}

/// Forward a `message` event into the bot loop's channel. Non-message events
/// and the bot's own posts are dropped.
async fn forward_event(state: &BotRouterState, event: &serde_json::Value) {
    if event["type"].as_str() != Some("message") {
        return;
    }

    let user = event["user"].as_str().unwrap_or_default();
    // Bot posts identify by bot_id; humans by user id.
    let sender = event["bot_id"].as_str().unwrap_or(user);
    if !state.config.bot_sender_id.is_empty() && sender == state.config.bot_sender_id {
        return;
    }

    let msg = InboundMessage {
        sender: sender.to_string(),
        channel: event["channel"].as_str().unwrap_or_default().to_string(),
        user: user.to_string(),
        text: event["text"].as_str().unwrap_or_default().to_string(),
    };

    if state.inbound.send(msg).await.is_err() {
        tracing::warn!("bot loop has stopped, dropping inbound message");
    }
}
