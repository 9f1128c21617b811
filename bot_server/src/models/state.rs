//! Process-wide bot state: the prompt store plus the cluster-busy flag.
//!
//! The prompt store is the durable part, written wholesale to the tracking
//! file after every mutating dispatcher operation. The busy flag is not
//! persisted; it is rediscovered from the message stream after a restart.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::events::DomainEvent;
use crate::models::prompt::{Prompt, PromptStatus};

/// In-memory state tree, exclusively mutated by the dispatcher.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BotState {
    /// Outstanding prompts in insertion order.
    #[serde(default)]
    pub prompts: Vec<Prompt>,

    /// Build id currently occupying the shared test cluster, `None` if idle.
    #[serde(skip)]
    pub cluster_busy: Option<String>,
}

impl BotState {
    /// First prompt tracking the given build id, if any.
    pub fn find_by_build_id(&self, build_id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|pr| pr.build_id() == build_id)
    }

    pub fn find_by_build_id_mut(&mut self, build_id: &str) -> Option<&mut Prompt> {
        self.prompts.iter_mut().find(|pr| pr.build_id() == build_id)
    }

    /// First prompt tracking the given branch, if any.
    pub fn find_by_branch(&self, branch: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|pr| pr.branch() == Some(branch))
    }

    /// Append a freshly posted prompt with status `open`.
    pub fn add_prompt(&mut self, input: DomainEvent, channel_id: &str, message_handle: &str) {
        self.prompts.push(Prompt {
            input,
            channel_id: channel_id.to_string(),
            message_handle: message_handle.to_string(),
            status: PromptStatus::Open,
        });
    }

    /// Remove the prompt for a build id, re-locating it by position at
    /// removal time. Returns the removed prompt, or `None` if untracked.
    pub fn remove_by_build_id(&mut self, build_id: &str) -> Option<Prompt> {
        let idx = self.prompts.iter().position(|pr| pr.build_id() == build_id)?;
        Some(self.prompts.remove(idx))
    }

    /// Load the tracking file. A missing file starts empty with a warning;
    /// an unreadable or unparseable file is a startup error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "tracking file not found, starting empty");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(anyhow::anyhow!("read tracking file {}: {e}", path.display()));
            }
        };
        let state: Self = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parse tracking file {}: {e}", path.display()))?;
        Ok(state)
    }

    /// Overwrite the tracking file with the current prompt store.
    pub fn save(&self, path: &Path) -> Result<(), BotError> {
        let persistence = |source| BotError::Persistence {
            path: path.display().to_string(),
            source,
        };
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| persistence(std::io::Error::other(e)))?;
        std::fs::write(path, content).map_err(persistence)
    }
}
