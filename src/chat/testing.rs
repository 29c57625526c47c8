//! Test doubles for the backend and tools.

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::history::StateReceiver;
use super::types::ConversationState;
use crate::llm::{BackendError, ChatBackend, Chunk, ChunkStream, GenerateRequest};
use crate::tools::{ToolContext, ToolDeclaration, ToolError, ToolHandler, ToolResult};

pub type ChunkSender = mpsc::UnboundedSender<Result<Chunk, BackendError>>;

/// One scripted reply of the backend.
pub enum Script {
    Chunks(Vec<Result<Chunk, BackendError>>),
    OpenError(BackendError),
    /// Chunks are fed by the test through the paired sender; the stream ends
    /// when the sender is dropped.
    Channel(mpsc::UnboundedReceiver<Result<Chunk, BackendError>>),
}

impl Script {
    pub fn text(deltas: &[&str]) -> Self {
        Self::Chunks(
            deltas
                .iter()
                .map(|d| Ok(Chunk::TextDelta(d.to_string())))
                .collect(),
        )
    }

    pub fn text_then_error(deltas: &[&str], error: BackendError) -> Self {
        let Self::Chunks(mut chunks) = Self::text(deltas) else {
            unreachable!()
        };
        chunks.push(Err(error));
        Self::Chunks(chunks)
    }

    pub fn channel() -> (ChunkSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::Channel(rx))
    }
}

/// Backend that replays scripts in order and records every request.
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedBackend {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn stream(&self, request: GenerateRequest) -> Result<ChunkStream, BackendError> {
        self.requests.lock().unwrap().push(request);
        let script = self.scripts.lock().unwrap().pop_front();

        match script {
            Some(Script::Chunks(chunks)) => Ok(Box::pin(stream::iter(chunks))),
            Some(Script::OpenError(e)) => Err(e),
            Some(Script::Channel(rx)) => Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }))),
            None => Err(BackendError::Request("no scripted response left".to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpyCall {
    pub arguments: Value,
    /// Conversation state at the moment the handler started.
    pub seen: Option<ConversationState>,
}

/// Tool handler that records its invocations.
pub struct SpyTool {
    name: String,
    hint: Option<String>,
    output: Value,
    failure: Option<ToolError>,
    delay: Duration,
    observer: Mutex<Option<StateReceiver>>,
    calls: Arc<Mutex<Vec<SpyCall>>>,
}

impl SpyTool {
    pub fn new(name: &str, output: Value) -> Self {
        Self {
            name: name.to_string(),
            hint: None,
            output,
            failure: None,
            delay: Duration::ZERO,
            observer: Mutex::new(None),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }

    pub fn failing(mut self, error: ToolError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn observe(&self, rx: StateReceiver) {
        *self.observer.lock().unwrap() = Some(rx);
    }

    pub fn calls(&self) -> Vec<SpyCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolHandler for SpyTool {
    fn definition(&self) -> ToolDeclaration {
        ToolDeclaration::new(self.name.clone(), "Records its calls.")
    }

    fn progress_hint(&self) -> String {
        self.hint
            .clone()
            .unwrap_or_else(|| format!("Tool: Running {}...", self.name))
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let seen = self
            .observer
            .lock()
            .unwrap()
            .as_ref()
            .map(|rx| rx.borrow().clone());
        self.calls.lock().unwrap().push(SpyCall {
            arguments: params,
            seen,
        });

        if !self.delay.is_zero() {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled(self.name.clone())),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(ToolResult::new(self.name.clone(), self.output.clone())),
        }
    }
}

/// Waits until the observed state satisfies `pred`.
pub async fn wait_for(
    rx: &mut StateReceiver,
    pred: impl FnMut(&ConversationState) -> bool,
) -> ConversationState {
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("history dropped");
    state.clone()
}
