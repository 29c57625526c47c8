use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::history::ConversationHistory;
use crate::llm::{FunctionResponse, ToolCallRequest, Turn};
use crate::tools::{ToolContext, ToolError, ToolRegistry};

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Function-response turn to feed back to the model.
    FollowUp(Turn),
    /// Every requested tool was unknown; holds the names that were skipped.
    NothingDispatched(Vec<String>),
    Cancelled,
}

/// Runs the tool calls of one batch, in order, one at a time.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    history: Arc<ConversationHistory>,
    cancel: CancellationToken,
    conversation_id: String,
    tool_timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        history: Arc<ConversationHistory>,
        cancel: CancellationToken,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            history,
            cancel,
            conversation_id: conversation_id.into(),
            tool_timeout: None,
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Unknown tool names are skipped. The first handler error stops the
    /// batch and is returned.
    pub async fn dispatch(&self, batch: Vec<ToolCallRequest>) -> Result<DispatchOutcome, ToolError> {
        let mut responses = Vec::with_capacity(batch.len());
        let mut skipped = Vec::new();

        for call in batch {
            let Some(handler) = self.registry.get(&call.name) else {
                warn!(tool = %call.name, "model requested unknown tool, skipping");
                skipped.push(call.name);
                continue;
            };

            // Observers must see the hint before a slow handler starts.
            self.history.set_hint(&handler.progress_hint());

            let params = call.arguments_value();
            handler.validate(&params)?;

            let ctx = ToolContext::new(&self.conversation_id, &call.name, self.cancel.clone());
            let execution = handler.execute(params, &ctx);

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(DispatchOutcome::Cancelled),
                result = async {
                    match self.tool_timeout {
                        Some(limit) => tokio::time::timeout(limit, execution)
                            .await
                            .map_err(|_| ToolError::Timeout {
                                tool: call.name.clone(),
                                secs: limit.as_secs(),
                            })?,
                        None => execution.await,
                    }
                } => result?,
            };

            info!(tool = %call.name, title = %result.title, "tool finished");
            responses.push(FunctionResponse {
                name: call.name,
                response: result.output,
            });
        }

        if responses.is_empty() {
            return Ok(DispatchOutcome::NothingDispatched(skipped));
        }
        Ok(DispatchOutcome::FollowUp(Turn::function_responses(responses)))
    }
}
