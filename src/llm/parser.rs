use serde::Deserialize;

use super::{BackendError, Chunk, ToolCallRequest};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    function_call: Option<ToolCallRequest>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Incremental parser for the backend's server-sent-event stream. Bytes may
/// arrive split anywhere, including inside a UTF-8 sequence, so partial lines
/// are buffered until their newline shows up.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<Chunk, BackendError>> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = Self::parse_line(line.trim_end_matches(['\n', '\r'])) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<Result<Chunk, BackendError>> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Self::parse_line(line.trim_end_matches('\r'))
    }

    fn parse_line(line: &str) -> Option<Result<Chunk, BackendError>> {
        let data = line.strip_prefix("data:")?.trim_start();
        if data.is_empty() || data == "[DONE]" {
            return None;
        }
        parse_payload(data)
    }
}

/// Turns one JSON payload into a chunk. A payload carrying function calls
/// yields only the calls; any text alongside them is dropped.
pub fn parse_payload(data: &str) -> Option<Result<Chunk, BackendError>> {
    let response: GenerateContentResponse = match serde_json::from_str(data) {
        Ok(response) => response,
        Err(e) => return Some(Err(BackendError::Decode(e.to_string()))),
    };

    if let Some(error) = response.error {
        return Some(Err(BackendError::Api(error.message)));
    }

    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let mut text = String::new();
    let mut calls = Vec::new();
    for part in parts {
        if let Some(call) = part.function_call {
            calls.push(call);
        } else if let Some(delta) = part.text.filter(|_| !part.thought) {
            text.push_str(&delta);
        }
    }

    if !calls.is_empty() {
        Some(Ok(Chunk::ToolCalls(calls)))
    } else if !text.is_empty() {
        Some(Ok(Chunk::TextDelta(text)))
    } else {
        None
    }
}
