//! Bot HTTP routes — CI webhooks and the Slack events endpoint.

pub mod slack;
pub mod webhook;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::config::BotConfig;
use crate::models::message::InboundMessage;
use crate::services::dispatcher::Dispatcher;

/// Shared state for bot route handlers.
#[derive(Clone)]
pub struct BotRouterState {
    pub dispatcher: Dispatcher,
    pub inbound: mpsc::Sender<InboundMessage>,
    pub config: Arc<BotConfig>,
}

/// Build the bot's Axum router. Wrong-method requests get `405` from the
/// method routing itself.
pub fn bot_router(state: BotRouterState) -> Router {
    Router::new()
        .route("/pushBBwebhook", post(webhook::push_webhook_handler))
        .route("/buildbot", get(webhook::buildbot_ops_handler))
        .route("/slack/events", post(slack::events_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
