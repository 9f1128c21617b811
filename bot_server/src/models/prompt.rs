//! An outstanding "run or ignore this build?" prompt awaiting a human.

use serde::{Deserialize, Serialize};

use crate::events::DomainEvent;

/// Decision state of a tracked prompt.
///
/// Serialized as the optional `status` field of the tracking file; `Open` is
/// the default and is omitted on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStatus {
    #[default]
    Open,
    Disabled,
    Verified,
}

impl PromptStatus {
    fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// One outstanding decision: a posted chat message offering to run or skip
/// regression tests for a product build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// The event that created this prompt.
    pub input: DomainEvent,
    #[serde(rename = "channel_id")]
    pub channel_id: String,
    /// Opaque handle of the posted message (the Slack message timestamp).
    /// Replaced whenever an edit returns a new handle.
    #[serde(rename = "msg_ts")]
    pub message_handle: String,
    #[serde(default, skip_serializing_if = "PromptStatus::is_open")]
    pub status: PromptStatus,
}

impl Prompt {
    pub fn build_id(&self) -> &str {
        self.input.build_id()
    }

    pub fn branch(&self) -> Option<&str> {
        self.input.branch()
    }
}
