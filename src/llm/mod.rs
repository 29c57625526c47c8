pub mod client;
pub mod parser;
pub mod turn;

pub use client::GeminiClient;
pub use turn::{Blob, FunctionResponse, Part, ReplyBuilder, ToolCallRequest, Turn, TurnRole};

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::tools::ToolDeclaration;

/// One incremental unit of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    TextDelta(String),
    ToolCalls(Vec<ToolCallRequest>),
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, BackendError>> + Send>>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("Failed to send request: {0}")]
    Request(String),
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Connection lost: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("{0}")]
    Api(String),
    #[error("Response timed out")]
    Timeout,
}

/// Everything the backend needs for one turn. `contents` is the full
/// conversation so far with the new turn last; the backend keeps no state.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub contents: Vec<Turn>,
    pub tools: Vec<ToolDeclaration>,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn stream(&self, request: GenerateRequest) -> Result<ChunkStream, BackendError>;
}
