//! Reaction dispatcher — turns classified events into prompt-store mutations
//! and chat effects, and owns the cluster busy/idle gating.
//!
//! Every operation locks the shared [`BotState`] for its whole
//! read-modify-write-persist sequence; the HTTP surface and the message loop
//! both funnel through here.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::BotConfig;
use crate::error::BotError;
use crate::events::DomainEvent;
use crate::models::prompt::PromptStatus;
use crate::models::state::BotState;
use crate::services::slack_service::{ActionButton, ChatChannel, MessageActions};

const MSG_CLUSTER_BUSY: &str = "Test cluster is busy: regression test of ";
const MSG_BUILD_DISABLED: &str = "User has decided to skip regression test on ";

#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<Mutex<BotState>>,
    chat: Arc<dyn ChatChannel>,
    config: Arc<BotConfig>,
}

impl Dispatcher {
    pub fn new(state: Arc<Mutex<BotState>>, chat: Arc<dyn ChatChannel>, config: Arc<BotConfig>) -> Self {
        Self { state, chat, config }
    }

    /// React to one classified event.
    pub async fn handle_event(&self, event: DomainEvent, channel_id: &str) {
        match event {
            DomainEvent::NewBuild { build_id, branch } => {
                self.on_new_build(build_id, branch, channel_id).await;
            }
            DomainEvent::RegressionStarted { build_id } => {
                self.on_regression_started(&build_id).await;
            }
            DomainEvent::RegressionDone { .. } => self.on_regression_done().await,
            DomainEvent::RegressionOutcome { build_id, outcome } => {
                self.on_regression_outcome(&build_id, &outcome).await;
            }
        }
    }

    /// A fresh product build: supersede any open prompt for the branch, then
    /// post a new prompt (busy notice instead of action buttons while the
    /// cluster is occupied).
    async fn on_new_build(&self, build_id: String, branch: Option<String>, channel_id: &str) {
        let mut state = self.state.lock().await;
        let mut mutated = false;

        if let Some(branch) = branch.as_deref() {
            if let Some(old) = state.find_by_branch(branch) {
                let old_id = old.build_id().to_string();
                let (old_channel, old_handle) =
                    (old.channel_id.clone(), old.message_handle.clone());
                if let Err(e) = self.chat.delete_message(&old_channel, &old_handle).await {
                    tracing::warn!(
                        build_id = %old_id,
                        "failed to delete superseded prompt message: {e}"
                    );
                }
                state.remove_by_build_id(&old_id);
                mutated = true;
            }
        }

        let (text, actions) = match &state.cluster_busy {
            Some(busy) => (format!("{MSG_CLUSTER_BUSY}{busy}"), None),
            None => {
                let (text, actions) = self.prompt_message(&build_id);
                (text, Some(actions))
            }
        };

        match self.chat.post_message(channel_id, &text, actions.as_ref()).await {
            Ok(handle) => {
                tracing::info!(
                    build_id = %build_id,
                    channel = channel_id,
                    handle = %handle,
                    "prompt posted"
                );
                state.add_prompt(DomainEvent::NewBuild { build_id, branch }, channel_id, &handle);
                mutated = true;
            }
            Err(e) => {
                tracing::error!(build_id = %build_id, channel = channel_id, "failed to post prompt: {e}");
            }
        }

        if mutated {
            self.persist(&state);
        }
    }

    /// The cluster went busy: rewrite every tracked prompt to the busy notice
    /// with no actions. Per-prompt failures are logged and skipped; the
    /// fan-out is not atomic.
    async fn on_regression_started(&self, build_id: &str) {
        let mut state = self.state.lock().await;
        state.cluster_busy = Some(build_id.to_string());
        tracing::info!(build_id, "cluster busy, disabling prompts");

        let text = format!("{MSG_CLUSTER_BUSY}{build_id}");
        for pr in state.prompts.iter_mut() {
            match self
                .chat
                .update_message(&pr.channel_id, &pr.message_handle, &text, None)
                .await
            {
                Ok(handle) => pr.message_handle = handle,
                Err(e) => {
                    tracing::error!(build_id = %pr.build_id(), "failed to disable prompt message: {e}");
                }
            }
        }

        self.persist(&state);
    }

    /// The cluster went idle: restore every tracked prompt (disabled ones get
    /// the disabled notice instead of action buttons).
    async fn on_regression_done(&self) {
        let mut state = self.state.lock().await;
        state.cluster_busy = None;
        tracing::info!("cluster idle, restoring prompts");

        for pr in state.prompts.iter_mut() {
            let (text, actions) = if pr.status == PromptStatus::Disabled {
                (format!("{MSG_BUILD_DISABLED}{}", pr.build_id()), None)
            } else {
                let (text, actions) = self.prompt_message(pr.build_id());
                (text, Some(actions))
            };
            match self
                .chat
                .update_message(&pr.channel_id, &pr.message_handle, &text, actions.as_ref())
                .await
            {
                Ok(handle) => pr.message_handle = handle,
                Err(e) => {
                    tracing::error!(build_id = %pr.build_id(), "failed to restore prompt message: {e}");
                }
            }
        }

        self.persist(&state);
    }

    /// A regression verdict: a literal `SUCCESS` resolves the prompt for that
    /// build; anything else is ignored.
    async fn on_regression_outcome(&self, build_id: &str, outcome: &str) {
        if outcome != "SUCCESS" {
            tracing::debug!(build_id, outcome, "regression outcome ignored");
            return;
        }

        let mut state = self.state.lock().await;
        let Some(pr) = state.find_by_build_id_mut(build_id) else {
            // No pending decision to resolve; not worth surfacing to chat.
            tracing::warn!(build_id, "no tracked prompt for verified build");
            return;
        };

        let text = format!("Product build {build_id} was verified by regression tests");
        if let Err(e) = self
            .chat
            .update_message(&pr.channel_id, &pr.message_handle, &text, None)
            .await
        {
            tracing::error!(build_id, "failed to update verified prompt message: {e}");
        }
        pr.status = PromptStatus::Verified;

        state.remove_by_build_id(build_id);
        tracing::info!(build_id, "build verified, prompt removed");
        self.persist(&state);
    }

    /// Mark a build's prompt as disabled (webhook surface). An edit that
    /// returns an unchanged handle is a retried no-op and is not persisted.
    pub async fn disable_build(&self, build_id: &str) -> Result<(), BotError> {
        let mut state = self.state.lock().await;
        let Some(pr) = state.find_by_build_id_mut(build_id) else {
            return Err(BotError::NotFound(build_id.to_string()));
        };

        let text = format!("{MSG_BUILD_DISABLED}{build_id}");
        let new_handle = self
            .chat
            .update_message(&pr.channel_id, &pr.message_handle, &text, None)
            .await?;
        tracing::info!(
            build_id,
            prev = %pr.message_handle,
            new = %new_handle,
            "sent disable update"
        );

        if new_handle != pr.message_handle {
            pr.message_handle = new_handle;
            pr.status = PromptStatus::Disabled;
            self.persist(&state);
        }

        Ok(())
    }

    /// Interpret unmatched chat text as a direct command.
    pub async fn handle_command(&self, channel_id: &str, user_id: &str, text: &str) {
        match text.trim() {
            "list" => {
                let report = {
                    let state = self.state.lock().await;
                    let mut report = String::from("Tracked prompts (build : message):");
                    for pr in state.prompts.iter().filter(|pr| pr.status == PromptStatus::Open) {
                        report.push_str(&format!("\n{} : {}", pr.build_id(), pr.message_handle));
                    }
                    report
                };
                if let Err(e) = self.chat.post_ephemeral(channel_id, user_id, &report).await {
                    tracing::error!(channel = channel_id, "failed to post prompt listing: {e}");
                }
            }
            "clear" => {
                let mut state = self.state.lock().await;
                for pr in &state.prompts {
                    if let Err(e) =
                        self.chat.delete_message(&pr.channel_id, &pr.message_handle).await
                    {
                        tracing::warn!(
                            build_id = %pr.build_id(),
                            "failed to delete prompt message: {e}"
                        );
                    }
                }
                state.prompts.clear();
                self.persist(&state);
                tracing::info!("prompt store cleared");
            }
            other => {
                if self.config.debug_rules {
                    tracing::debug!(text = other, "not a recognized message or a command");
                }
            }
        }
    }

    /// The two-action prompt for a build: run the regression test, or ignore
    /// the build via this service's disable endpoint.
    fn prompt_message(&self, build_id: &str) -> (String, MessageActions) {
        let text = format!("Product build {build_id} is created");
        let run_url = format!(
            "{}/job/run-regression-tests/buildWithParameters?token={}&AN_BUILD={}&TESTSET={}",
            self.config.ci_base_url,
            self.config.ci_trigger_token,
            build_id,
            self.config.regression_testset,
        );
        let disable_url = format!(
            "{}/buildbot?op=disableBuild&AN_BUILD={}",
            self.config.public_base_url, build_id,
        );
        let actions = MessageActions {
            note: "Verifying a new build takes about 90 minutes and blocks the test cluster"
                .to_string(),
            buttons: vec![
                ActionButton {
                    label: "Run regression test".to_string(),
                    url: run_url,
                    danger: true,
                },
                ActionButton {
                    label: "Ignore this build".to_string(),
                    url: disable_url,
                    danger: false,
                },
            ],
        };
        (text, actions)
    }

    /// Flush the prompt store to the tracking file. A write failure halts the
    /// process: decisions the bot cannot durably record must not continue.
    fn persist(&self, state: &BotState) {
        if let Err(e) = state.save(Path::new(&self.config.trackfile)) {
            tracing::error!("{e}; halting");
            std::process::exit(1);
        }
        crate::metrics::tracked_prompts(state.prompts.len());
    }
}
