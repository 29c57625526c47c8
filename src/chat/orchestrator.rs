use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::dispatch::{DispatchOutcome, ToolDispatcher};
use super::history::{ConversationHistory, StateReceiver, TurnLog};
use super::session::{SessionOutcome, StreamingSession};
use super::types::{Attachment, ConversationState, Message};
use crate::llm::{ChatBackend, Part, Turn, TurnRole};
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Longest wait for the next chunk. `None` waits forever.
    pub chunk_timeout: Option<Duration>,
    pub tool_timeout: Option<Duration>,
    pub thinking_hint: String,
    /// Tool round-trips allowed for a single user message.
    pub max_tool_rounds: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            chunk_timeout: None,
            tool_timeout: Some(Duration::from_secs(30)),
            thinking_hint: "Thinking...".to_string(),
            max_tool_rounds: 8,
        }
    }
}

/// Entry point for a UI: owns one conversation, accepts new messages and
/// publishes [`ConversationState`] snapshots while turns stream in.
pub struct ChatOrchestrator {
    conversation_id: String,
    backend: Arc<dyn ChatBackend>,
    registry: Arc<ToolRegistry>,
    history: Arc<ConversationHistory>,
    turns: Arc<Mutex<TurnLog>>,
    cancel: CancellationToken,
    options: OrchestratorOptions,
}

impl ChatOrchestrator {
    pub fn new(backend: Arc<dyn ChatBackend>, registry: Arc<ToolRegistry>) -> Self {
        Self::with_options(backend, registry, OrchestratorOptions::default())
    }

    pub fn with_options(
        backend: Arc<dyn ChatBackend>,
        registry: Arc<ToolRegistry>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            conversation_id: cuid2::create_id(),
            backend,
            registry,
            history: Arc::new(ConversationHistory::new()),
            turns: Arc::new(Mutex::new(TurnLog::new())),
            cancel: CancellationToken::new(),
            options,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn subscribe(&self) -> StateReceiver {
        self.history.subscribe()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.history.snapshot()
    }

    /// Starts a new turn and returns immediately; progress is published
    /// through [`subscribe`](Self::subscribe).
    ///
    /// Returns `false` without touching the conversation when there is
    /// nothing to send, a turn is already streaming, or the orchestrator has
    /// been shut down. Must be called from within a tokio runtime.
    pub fn send_message(&self, text: &str, attachment: Option<Attachment>) -> bool {
        if text.trim().is_empty() && attachment.is_none() {
            debug!("ignoring empty message");
            return false;
        }
        if self.is_shut_down() {
            warn!("send_message after shutdown");
            return false;
        }

        let user = Message::user(text, attachment.clone());
        let placeholder = Message::placeholder(self.options.thinking_hint.clone());
        if !self.history.begin_turn(user, placeholder) {
            warn!("a turn is already streaming, message rejected");
            return false;
        }

        let driver = TurnDriver {
            conversation_id: self.conversation_id.clone(),
            backend: self.backend.clone(),
            registry: self.registry.clone(),
            history: self.history.clone(),
            turns: self.turns.clone(),
            cancel: self.cancel.clone(),
            options: self.options.clone(),
        };
        let text = text.to_string();
        let span = tracing::info_span!("turn", conversation = %self.conversation_id);
        tokio::spawn(async move { driver.run(text, attachment).await }.instrument(span));

        true
    }

    /// Tears the conversation down. The active stream is closed and no
    /// state update is published afterwards.
    pub fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        info!(conversation = %self.conversation_id, "shutting down");
        self.history.close();
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ChatOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Everything a spawned turn needs, detached from the orchestrator.
struct TurnDriver {
    conversation_id: String,
    backend: Arc<dyn ChatBackend>,
    registry: Arc<ToolRegistry>,
    history: Arc<ConversationHistory>,
    turns: Arc<Mutex<TurnLog>>,
    cancel: CancellationToken,
    options: OrchestratorOptions,
}

impl TurnDriver {
    async fn run(self, text: String, attachment: Option<Attachment>) {
        let mut prompt = match build_prompt(&text, attachment.as_ref()) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!(error = %e, "failed to encode attachment");
                self.history
                    .fail_turn(&format!("Error: Could not encode attachment: {}", e));
                return;
            }
        };

        let mut log = self.turns.lock().await;
        let mark = log.len();
        let dispatcher = ToolDispatcher::new(
            self.registry.clone(),
            self.history.clone(),
            self.cancel.clone(),
            &self.conversation_id,
        )
        .with_tool_timeout(self.options.tool_timeout);

        let mut rounds = 0;
        loop {
            let mut session =
                StreamingSession::new(self.backend.clone(), self.history.clone(), self.cancel.clone())
                    .with_tools(self.registry.declarations())
                    .with_chunk_timeout(self.options.chunk_timeout);

            let batch = match session.start(&mut log, prompt).await {
                SessionOutcome::ToolDispatch(batch) => batch,
                SessionOutcome::Finalized => return,
                SessionOutcome::Failed | SessionOutcome::Cancelled => {
                    log.rollback(mark);
                    return;
                }
            };

            rounds += 1;
            if rounds > self.options.max_tool_rounds {
                warn!(rounds, "tool round limit reached");
                log.rollback(mark);
                self.history.fail_turn(&format!(
                    "Error: Gave up after {} tool rounds",
                    self.options.max_tool_rounds
                ));
                return;
            }

            let names: Vec<&str> = batch.iter().map(|c| c.name.as_str()).collect();
            info!(round = rounds, tools = ?names, "dispatching tool calls");

            match dispatcher.dispatch(batch).await {
                Ok(DispatchOutcome::FollowUp(turn)) => prompt = turn,
                Ok(DispatchOutcome::NothingDispatched(names)) => {
                    log.rollback(mark);
                    self.history.fail_turn(&format!(
                        "Error: Model requested unknown tool(s): {}",
                        names.join(", ")
                    ));
                    return;
                }
                Ok(DispatchOutcome::Cancelled) => {
                    log.rollback(mark);
                    return;
                }
                Err(e) => {
                    error!(error = %e, "tool dispatch failed");
                    log.rollback(mark);
                    self.history.fail_turn(&format!("Error: {}", e));
                    return;
                }
            }
        }
    }
}

/// User turn for the backend: the image first, then the text.
fn build_prompt(text: &str, attachment: Option<&Attachment>) -> Result<Turn, image::ImageError> {
    let mut parts = Vec::new();
    if let Some(attachment) = attachment {
        parts.push(Part::InlineData(attachment.to_inline_data()?));
    }
    if !text.trim().is_empty() {
        parts.push(Part::Text(text.to_string()));
    }
    Ok(Turn::new(TurnRole::User, parts))
}
