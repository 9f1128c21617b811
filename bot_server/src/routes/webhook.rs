//! Repository-push webhook and buildbot operations endpoint.

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use super::BotRouterState;

/// Form payload of a repository push notification.
#[derive(Debug, Deserialize)]
pub struct PushWebhook {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default, rename = "refChange_refId")]
    pub ref_change_ref_id: String,
    #[serde(default, rename = "refChange_toHash")]
    pub ref_change_to_hash: String,
    #[serde(default, rename = "refChange_type")]
    pub ref_change_type: String,
    #[serde(default, rename = "refChange_ts")]
    pub ref_change_ts: String,
}

/// `POST /pushBBwebhook` — acknowledge a repository push.
pub async fn push_webhook_handler(
    State(_state): State<BotRouterState>,
    Form(push): Form<PushWebhook>,
) -> Response {
    crate::metrics::webhook_received("pushBBwebhook");

    if push.message.is_empty() {
        return (
            StatusCode::NO_CONTENT,
            "could not find commit 'message' parameter in request body",
        )
            .into_response();
    }

    tracing::info!(
        user = %push.user_name,
        email = %push.user_email,
        ref_id = %push.ref_change_ref_id,
        "received push webhook"
    );
    tracing::info!(
        to_hash = %push.ref_change_to_hash,
        change_type = %push.ref_change_type,
        ts = %push.ref_change_ts,
        "push ref change"
    );
    // TODO: trigger the product-build job for the pushed ref.

    Json(serde_json::json!({ "status": "ok" })).into_response()
}

/// Query parameters of the buildbot operations endpoint.
#[derive(Debug, Deserialize)]
pub struct BuildbotQuery {
    #[serde(default)]
    pub op: String,
    #[serde(default, rename = "AN_BUILD")]
    pub an_build: String,
}

/// `GET /buildbot?op=disableBuild&AN_BUILD=<id>` — mark a build's prompt as
/// disabled.
pub async fn buildbot_ops_handler(
    State(state): State<BotRouterState>,
    Query(query): Query<BuildbotQuery>,
) -> Response {
    crate::metrics::webhook_received("buildbot");

    if query.op != "disableBuild" {
        return (StatusCode::BAD_REQUEST, "Only 'op=disableBuild' is supported").into_response();
    }

    tracing::info!(build_id = %query.an_build, "disable build requested");
    match state.dispatcher.disable_build(&query.an_build).await {
        Ok(()) => {
            (StatusCode::OK, format!("Disabled {} successfully.", query.an_build)).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("FAILED to disable {}: {e}", query.an_build),
        )
            .into_response(),
    }
}
