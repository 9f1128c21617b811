//! The bot's message loop — single consumer of the inbound chat stream.
//!
//! Classification and dispatch happen strictly serially here; only the HTTP
//! surface runs concurrently, contending on the shared state inside the
//! dispatcher.

use tokio::sync::mpsc;

use crate::models::message::InboundMessage;
use crate::services::classifier::{self, Classification, SenderIds};
use crate::services::dispatcher::Dispatcher;

/// Operator kill-switch: a chat message with exactly this text stops the loop.
const STOP_COMMAND: &str = "ENOUGH";

/// Run the message loop until the inbound channel closes or the stop command
/// arrives. Spawned as a background tokio task.
pub async fn run_bot_loop(
    mut inbound: mpsc::Receiver<InboundMessage>,
    dispatcher: Dispatcher,
    senders: SenderIds,
    debug_rules: bool,
) {
    tracing::info!("bot event loop started");

    while let Some(msg) = inbound.recv().await {
        if msg.text == STOP_COMMAND {
            tracing::info!("received stop command, shutting down event loop");
            break;
        }
        if debug_rules {
            let first = msg.text.lines().next().unwrap_or("");
            tracing::debug!(sender = %msg.sender, line0 = first, "classifying message");
        }

        match classifier::classify(&senders, &msg.sender, &msg.text) {
            Classification::Matched(event) => {
                crate::metrics::message_classified("matched");
                dispatcher.handle_event(event, &msg.channel).await;
            }
            Classification::Rejected(reason) => {
                // Recognized shape, intentionally ignored; never treated as
                // a command.
                crate::metrics::message_classified("rejected");
                tracing::debug!(sender = %msg.sender, "message ignored: {reason}");
            }
            Classification::NoMatch => {
                crate::metrics::message_classified("no_match");
                dispatcher.handle_command(&msg.channel, &msg.user, &msg.text).await;
            }
        }
    }

    tracing::info!("bot event loop stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::config::BotConfig;
    use crate::models::prompt::PromptStatus;
    use crate::models::state::BotState;
    use crate::services::slack_service::{ChatChannel, ChatError, MessageActions};

    /// Minimal recording chat: every effect as (method, text, has_actions).
    #[derive(Default)]
    struct StubChat {
        calls: StdMutex<Vec<(&'static str, String, bool)>>,
        counter: AtomicU64,
    }

    impl StubChat {
        fn next_handle(&self) -> String {
            format!("ts-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1)
        }

        fn calls(&self) -> Vec<(&'static str, String, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatChannel for StubChat {
        async fn post_message(
            &self,
            _channel: &str,
            text: &str,
            actions: Option<&MessageActions>,
        ) -> Result<String, ChatError> {
            self.calls.lock().unwrap().push(("post", text.to_string(), actions.is_some()));
            Ok(self.next_handle())
        }

        async fn update_message(
            &self,
            _channel: &str,
            _handle: &str,
            text: &str,
            actions: Option<&MessageActions>,
        ) -> Result<String, ChatError> {
            self.calls.lock().unwrap().push(("update", text.to_string(), actions.is_some()));
            Ok(self.next_handle())
        }

        async fn delete_message(&self, _channel: &str, _handle: &str) -> Result<(), ChatError> {
            self.calls.lock().unwrap().push(("delete", String::new(), false));
            Ok(())
        }

        async fn post_ephemeral(
            &self,
            _channel: &str,
            _user: &str,
            text: &str,
        ) -> Result<(), ChatError> {
            self.calls.lock().unwrap().push(("ephemeral", text.to_string(), false));
            Ok(())
        }
    }

    const CI: &str = "B_CISERVER";
    const AUTOMATION: &str = "B_AUTOMATION";

    struct Harness {
        tx: mpsc::Sender<InboundMessage>,
        loop_task: tokio::task::JoinHandle<()>,
        chat: Arc<StubChat>,
        state: Arc<Mutex<BotState>>,
        trackfile: String,
        _dir: tempfile::TempDir,
    }

    fn start_harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let trackfile = dir.path().join("tracking.json").to_string_lossy().into_owned();
        let config = BotConfig {
            trackfile: trackfile.clone(),
            ci_base_url: "http://ci.example.com".to_string(),
            public_base_url: "http://bot.example.com".to_string(),
            ..BotConfig::default()
        };
        let chat = Arc::new(StubChat::default());
        let state = Arc::new(Mutex::new(BotState::default()));
        let dispatcher = Dispatcher::new(state.clone(), chat.clone(), Arc::new(config));
        let senders = SenderIds {
            ci: CI.to_string(),
            automation: AUTOMATION.to_string(),
        };
        let (tx, rx) = mpsc::channel(8);
        let loop_task = tokio::spawn(run_bot_loop(rx, dispatcher, senders, false));
        Harness { tx, loop_task, chat, state, trackfile, _dir: dir }
    }

    fn message(sender: &str, text: &str) -> InboundMessage {
        InboundMessage {
            sender: sender.to_string(),
            channel: "C1".to_string(),
            user: "U_ALICE".to_string(),
            text: text.to_string(),
        }
    }

    const NEW_BUILD_7: &str =
        "<http://ci.example.com/job/product-build/7/|Build product-build #7>, branch feature-x: SUCCESS";

    #[tokio::test]
    async fn test_new_build_message_creates_prompt_end_to_end() {
        let h = start_harness();
        h.tx.send(message(CI, NEW_BUILD_7)).await.unwrap();
        drop(h.tx);
        h.loop_task.await.unwrap();

        let state = h.state.lock().await;
        assert_eq!(state.prompts.len(), 1);
        assert_eq!(state.prompts[0].status, PromptStatus::Open);
        assert_eq!(state.prompts[0].build_id(), "7");
        assert_eq!(state.prompts[0].channel_id, "C1");
        assert_eq!(state.prompts[0].message_handle, "ts-1");

        let raw = std::fs::read_to_string(&h.trackfile).unwrap();
        assert!(raw.contains("\"an_build\": \"7\""));
    }

    #[tokio::test]
    async fn test_regression_start_after_new_build_disables_prompt() {
        let h = start_harness();
        h.tx.send(message(CI, NEW_BUILD_7)).await.unwrap();
        h.tx.send(message(
            AUTOMATION,
            "Playbook regression_tests.yaml *STARTED* at 10.0.0.4\nhost: cluster-dev\nProduct build: feature-x",
        ))
        .await
        .unwrap();
        drop(h.tx);
        h.loop_task.await.unwrap();

        let state = h.state.lock().await;
        assert_eq!(state.cluster_busy.as_deref(), Some("feature-x"));

        let calls = h.chat.calls();
        let (method, text, has_actions) = calls.last().unwrap();
        assert_eq!(*method, "update");
        assert!(text.starts_with("Test cluster is busy"));
        assert!(!*has_actions);
    }

    #[tokio::test]
    async fn test_rejected_message_does_not_fall_through_to_commands() {
        let h = start_harness();
        h.tx.send(message(CI, NEW_BUILD_7)).await.unwrap();
        // Recognized shape (failed build) from the CI sender: must be
        // ignored, not interpreted as a command.
        h.tx.send(message(
            CI,
            "<http://ci.example.com/job/product-build/9/|Build product-build #9>, branch feature-x: FAILURE",
        ))
        .await
        .unwrap();
        // Plain text from a user does reach command handling.
        h.tx.send(message("U_ALICE", "clear")).await.unwrap();
        drop(h.tx);
        h.loop_task.await.unwrap();

        let state = h.state.lock().await;
        assert!(state.prompts.is_empty());

        let calls = h.chat.calls();
        // One post for build 7, one delete from the clear command; the
        // rejected build never superseded the prompt.
        assert_eq!(calls.iter().filter(|(m, ..)| *m == "post").count(), 1);
        assert_eq!(calls.iter().filter(|(m, ..)| *m == "delete").count(), 1);
    }

    #[tokio::test]
    async fn test_stop_command_ends_the_loop() {
        let h = start_harness();
        h.tx.send(message("U_ALICE", "ENOUGH")).await.unwrap();
        h.loop_task.await.unwrap();
        assert!(h.chat.calls().is_empty());
    }
}
