pub mod chat;
pub mod config;
pub mod llm;
pub mod logging;
pub mod tools;

pub use chat::{Attachment, ChatOrchestrator, ConversationState, Message, OrchestratorOptions, Role};
pub use config::ChatConfig;
pub use llm::{ChatBackend, GeminiClient};
pub use tools::{initialize_tool_registry, ToolRegistry};
