use serde::{Deserialize, Serialize};

/// Author of a turn as the backend sees it. `Function` carries tool results
/// back to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
    Function,
}

/// A function call the model asked for mid-stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(rename = "args", default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(Blob),
    FunctionCall(ToolCallRequest),
    FunctionResponse(FunctionResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        let arguments = match arguments {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            name: name.into(),
            arguments,
        }
    }

    pub fn arguments_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.arguments.clone())
    }
}

impl Turn {
    pub fn new(role: TurnRole, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, vec![Part::Text(text.into())])
    }

    pub fn function_responses(responses: Vec<FunctionResponse>) -> Self {
        Self::new(
            TurnRole::Function,
            responses.into_iter().map(Part::FunctionResponse).collect(),
        )
    }

    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn function_calls(&self) -> Vec<&ToolCallRequest> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }
}

/// Accumulates the model's streamed output into the turn recorded in history.
#[derive(Debug, Default)]
pub struct ReplyBuilder {
    text: String,
    calls: Vec<ToolCallRequest>,
}

impl ReplyBuilder {
    pub fn push_text(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    pub fn push_calls(&mut self, calls: &[ToolCallRequest]) {
        self.calls.extend_from_slice(calls);
    }

    pub fn calls(&self) -> &[ToolCallRequest] {
        &self.calls
    }

    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    pub fn build(self) -> Turn {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(Part::Text(self.text));
        }
        parts.extend(self.calls.into_iter().map(Part::FunctionCall));
        Turn::new(TurnRole::Model, parts)
    }
}
