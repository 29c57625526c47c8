pub mod dispatch;
pub mod history;
pub mod orchestrator;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{DispatchOutcome, ToolDispatcher};
pub use history::{ConversationHistory, StateReceiver, TurnLog};
pub use orchestrator::{ChatOrchestrator, OrchestratorOptions};
pub use session::{SessionOutcome, SessionState, StreamingSession};
pub use types::{Attachment, ConversationState, Message, Role};
