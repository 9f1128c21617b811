//! Bot configuration — loaded from a JSON file at startup.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Display name, used in startup logs.
    pub bot_name: String,
    /// Slack Web API bearer token.
    pub slack_api_token: String,
    /// Signing secret for validating inbound Slack requests.
    pub slack_signing_secret: String,
    /// The bot's own sender id; its messages are dropped before classification.
    pub bot_sender_id: String,
    /// Sender identity of the CI server's chat integration.
    pub ci_sender: String,
    /// Sender identity of the automation tool's chat integration.
    pub automation_sender: String,
    /// Path of the persisted tracking file.
    pub trackfile: String,
    /// HTTP listen port for webhooks and the events endpoint.
    pub listen_port: u16,
    /// Base URL of the CI server, for the "run regression test" link.
    pub ci_base_url: String,
    /// Remote-trigger token for the regression-test job.
    pub ci_trigger_token: String,
    /// Test set passed to the regression-test job.
    pub regression_testset: String,
    /// Externally reachable base URL of this service, for the disable link.
    pub public_base_url: String,
    /// Verbose classifier/command diagnostics.
    pub debug_rules: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_name: "buildbot".to_string(),
            slack_api_token: String::new(),
            slack_signing_secret: String::new(),
            bot_sender_id: String::new(),
            ci_sender: String::new(),
            automation_sender: String::new(),
            trackfile: "tracking.json".to_string(),
            listen_port: 8000,
            ci_base_url: String::new(),
            ci_trigger_token: String::new(),
            regression_testset: "core".to_string(),
            public_base_url: String::new(),
            debug_rules: false,
        }
    }
}

impl BotConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse config file {}", path.display()))?;

        if config.slack_api_token.is_empty() {
            tracing::warn!("slack_api_token not set -- chat API calls will fail");
        }
        if config.slack_signing_secret.is_empty() {
            tracing::warn!("slack_signing_secret not set -- event signature validation disabled");
        }
        if config.ci_sender.is_empty() || config.automation_sender.is_empty() {
            tracing::warn!("sender identities not set -- no messages will classify");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botconfig.json");
        std::fs::write(
            &path,
            r#"{
                "slack_api_token": "xoxb-test",
                "ci_sender": "B_CI",
                "automation_sender": "B_AUTO",
                "trackfile": "/var/lib/buildbot/tracking.json"
            }"#,
        )
        .unwrap();

        let config = BotConfig::load(&path).unwrap();
        assert_eq!(config.slack_api_token, "xoxb-test");
        assert_eq!(config.trackfile, "/var/lib/buildbot/tracking.json");
        assert_eq!(config.listen_port, 8000);
        assert_eq!(config.regression_testset, "core");
        assert!(!config.debug_rules);
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BotConfig::load(&dir.path().join("absent.json")).is_err());
    }
}
