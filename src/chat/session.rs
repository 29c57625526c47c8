use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::history::{ConversationHistory, TurnLog};
use crate::llm::{
    BackendError, ChatBackend, Chunk, GenerateRequest, ReplyBuilder, ToolCallRequest, Turn,
};
use crate::tools::ToolDeclaration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingChunks,
    ToolDispatch,
    Finalized,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The turn is over and `is_streaming` has been cleared.
    Finalized,
    /// The stream failed. The error replaced the reply and `is_streaming`
    /// has been cleared; nothing was committed to the log.
    Failed,
    /// The model asked for tools; the conversation is still in flight.
    ToolDispatch(Vec<ToolCallRequest>),
    /// Torn down before completion. Nothing further was written.
    Cancelled,
}

/// One request/response cycle against the backend.
///
/// Text deltas are applied to the last message as they arrive. Tool-call
/// chunks are recorded and handed back to the caller once the stream ends.
pub struct StreamingSession {
    backend: Arc<dyn ChatBackend>,
    history: Arc<ConversationHistory>,
    tools: Vec<ToolDeclaration>,
    cancel: CancellationToken,
    chunk_timeout: Option<Duration>,
    state: SessionState,
}

impl StreamingSession {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        history: Arc<ConversationHistory>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            history,
            tools: Vec::new(),
            cancel,
            chunk_timeout: None,
            state: SessionState::Idle,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_chunk_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
    }

    /// Sends `prompt` after everything in `log` and consumes the response.
    ///
    /// `log` only gains the prompt and the model's reply when the stream
    /// completed, or when it produced tool calls that still need answering.
    pub async fn start(&mut self, log: &mut TurnLog, prompt: Turn) -> SessionOutcome {
        if self.state != SessionState::Idle {
            warn!(state = ?self.state, "session already started");
            return SessionOutcome::Cancelled;
        }
        self.transition(SessionState::AwaitingChunks);

        let request = GenerateRequest {
            contents: log.contents_with(&prompt),
            tools: self.tools.clone(),
        };
        let mut reply = ReplyBuilder::default();

        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.consume(request, &mut reply) => Some(result),
        };

        let Some(result) = result.filter(|_| !self.cancel.is_cancelled()) else {
            info!("session cancelled, stream closed");
            self.transition(SessionState::Finalized);
            return SessionOutcome::Cancelled;
        };

        if reply.has_calls() {
            if let Err(e) = &result {
                warn!(error = %e, "stream failed after tool calls were recorded");
            }
            let calls = reply.calls().to_vec();
            log.commit(prompt, reply.build());
            self.transition(SessionState::ToolDispatch);
            return SessionOutcome::ToolDispatch(calls);
        }

        self.transition(SessionState::Finalized);
        match result {
            Ok(()) => {
                log.commit(prompt, reply.build());
                self.history.finish_turn();
                SessionOutcome::Finalized
            }
            Err(e) => {
                error!(error = %e, "stream failed");
                self.history.fail_turn(&format!("Error: {}", e));
                SessionOutcome::Failed
            }
        }
    }

    async fn consume(
        &self,
        request: GenerateRequest,
        reply: &mut ReplyBuilder,
    ) -> Result<(), BackendError> {
        let mut stream = self.backend.stream(request).await?;

        loop {
            let next = match self.chunk_timeout {
                Some(limit) => tokio::time::timeout(limit, stream.next())
                    .await
                    .map_err(|_| BackendError::Timeout)?,
                None => stream.next().await,
            };

            match next {
                Some(Ok(Chunk::TextDelta(delta))) => {
                    debug!(len = delta.len(), "text delta");
                    reply.push_text(&delta);
                    self.history.append_text(&delta);
                }
                Some(Ok(Chunk::ToolCalls(calls))) => {
                    debug!(count = calls.len(), "tool calls recorded");
                    reply.push_calls(&calls);
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            }
        }
    }
}
