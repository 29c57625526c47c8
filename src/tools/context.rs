use tokio_util::sync::CancellationToken;

pub struct ToolContext {
    pub conversation_id: String,
    pub tool_name: String,
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(
        conversation_id: impl Into<String>,
        tool_name: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            tool_name: tool_name.into(),
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
