//! Slack integration — the `ChatChannel` capability, its Web API client,
//! and request-signature validation for the events endpoint.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed request before it is treated as a replay.
const SIGNATURE_MAX_AGE_SECS: i64 = 300;

/// Chat transport failure.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} failed: {error}")]
    Api { method: &'static str, error: String },
}

/// A link button attached to a prompt message.
#[derive(Debug, Clone)]
pub struct ActionButton {
    pub label: String,
    pub url: String,
    pub danger: bool,
}

/// Interactive part of a prompt: a short note plus link buttons.
#[derive(Debug, Clone)]
pub struct MessageActions {
    pub note: String,
    pub buttons: Vec<ActionButton>,
}

/// The chat capability consumed by the dispatcher. Message handles are
/// opaque tokens (Slack message timestamps) identifying an updatable post.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Post a message, returning its handle.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        actions: Option<&MessageActions>,
    ) -> Result<String, ChatError>;

    /// Replace a posted message's text and actions, returning the (possibly
    /// changed) handle.
    async fn update_message(
        &self,
        channel: &str,
        handle: &str,
        text: &str,
        actions: Option<&MessageActions>,
    ) -> Result<String, ChatError>;

    /// Delete a posted message.
    async fn delete_message(&self, channel: &str, handle: &str) -> Result<(), ChatError>;

    /// Post a reply visible only to one user.
    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str)
        -> Result<(), ChatError>;
}

/// Slack Web API implementation of [`ChatChannel`].
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
}

impl SlackClient {
    pub fn new(token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.to_string(),
        }
    }

    async fn call(
        &self,
        method: &'static str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ChatError> {
        let url = format!("https://slack.com/api/{method}");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let value: serde_json::Value = resp.json().await?;

        if value["ok"].as_bool() != Some(true) {
            let error = value["error"].as_str().unwrap_or("unknown error").to_string();
            crate::metrics::chat_api_error(method);
            return Err(ChatError::Api { method, error });
        }
        Ok(value)
    }
}

/// Render prompt actions as a legacy-attachment payload.
fn attachments_json(actions: Option<&MessageActions>) -> serde_json::Value {
    let Some(actions) = actions else {
        // An explicit empty list clears attachments on update.
        return serde_json::json!([]);
    };
    let buttons: Vec<serde_json::Value> = actions
        .buttons
        .iter()
        .map(|b| {
            let mut button = serde_json::json!({
                "type": "button",
                "text": b.label,
                "url": b.url,
            });
            if b.danger {
                button["style"] = "danger".into();
            }
            button
        })
        .collect();
    serde_json::json!([{
        "text": actions.note,
        "fallback": actions.note,
        "actions": buttons,
    }])
}

#[async_trait]
impl ChatChannel for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        actions: Option<&MessageActions>,
    ) -> Result<String, ChatError> {
        let value = self
            .call(
                "chat.postMessage",
                serde_json::json!({
                    "channel": channel,
                    "text": text,
                    "attachments": attachments_json(actions),
                }),
            )
            .await?;
        Ok(value["ts"].as_str().unwrap_or_default().to_string())
    }

    async fn update_message(
        &self,
        channel: &str,
        handle: &str,
        text: &str,
        actions: Option<&MessageActions>,
    ) -> Result<String, ChatError> {
        let value = self
            .call(
                "chat.update",
                serde_json::json!({
                    "channel": channel,
                    "ts": handle,
                    "text": text,
                    "attachments": attachments_json(actions),
                }),
            )
            .await?;
        Ok(value["ts"].as_str().unwrap_or(handle).to_string())
    }

    async fn delete_message(&self, channel: &str, handle: &str) -> Result<(), ChatError> {
        self.call(
            "chat.delete",
            serde_json::json!({ "channel": channel, "ts": handle }),
        )
        .await?;
        Ok(())
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), ChatError> {
        self.call(
            "chat.postEphemeral",
            serde_json::json!({ "channel": channel, "user": user, "text": text }),
        )
        .await?;
        Ok(())
    }
}

/// Validate a Slack request signature (`X-Slack-Signature`, v0 scheme).
pub fn validate_signature(secret: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        tracing::warn!("signing secret not configured, skipping validation");
        return true;
    }

    let ts: i64 = match timestamp.parse() {
        Ok(ts) => ts,
        Err(_) => return false,
    };
    if (chrono::Utc::now().timestamp() - ts).abs() > SIGNATURE_MAX_AGE_SECS {
        return false;
    }

    let sig = signature.strip_prefix("v0=").unwrap_or(signature);
    let sig_bytes = match hex::decode(sig) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);

    mac.verify_slice(&sig_bytes).is_ok()
}
