use schemars::Schema;
use serde::{Deserialize, Serialize};

use tracing::warn;

pub type ToolName = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub param_type: ParameterType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<ParameterType>),
    Object(Vec<ParameterSchema>),
}

/// Static description of a tool, registered once at startup and advertised
/// to the backend with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDeclaration {
    pub name: ToolName,
    pub description: String,
    pub parameters: Vec<ParameterSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub title: String,
    pub output: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments for {tool}: {reason}")]
    Validation { tool: String, reason: String },
    #[error("{tool} failed: {reason}")]
    Execution { tool: String, reason: String },
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
    #[error("{0} was cancelled")]
    Cancelled(String),
}

impl ToolError {
    pub fn validation(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Execution {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterSchema) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// JSON schema of the top-level argument object.
    pub fn parameters_json(&self) -> serde_json::Value {
        object_schema(&self.parameters, None)
    }

    pub fn input_schema(&self) -> Schema {
        match serde_json::from_value(self.parameters_json()) {
            Ok(schema) => schema,
            Err(e) => {
                warn!(tool = %self.name, error = %e, "invalid parameter schema, advertising any-schema");
                Schema::from(true)
            }
        }
    }

    /// Entry for the backend's `functionDeclarations` list.
    pub fn to_function_declaration(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.input_schema(),
        })
    }
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        description: impl Into<String>,
        param_type: ParameterType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
            param_type,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        param_type: ParameterType,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, description, param_type)
        }
    }

    fn to_json_schema(&self) -> serde_json::Value {
        self.param_type.to_json_schema(Some(&self.description))
    }
}

impl ParameterType {
    fn to_json_schema(&self, description: Option<&str>) -> serde_json::Value {
        let mut schema = match self {
            ParameterType::String => serde_json::json!({"type": "string"}),
            ParameterType::Integer => serde_json::json!({"type": "integer"}),
            ParameterType::Number => serde_json::json!({"type": "number"}),
            ParameterType::Boolean => serde_json::json!({"type": "boolean"}),
            ParameterType::Array(inner) => {
                serde_json::json!({
                    "type": "array",
                    "items": inner.to_json_schema(None)
                })
            }
            ParameterType::Object(props) => return object_schema(props, description),
        };
        if let (Some(description), Some(obj)) = (description, schema.as_object_mut()) {
            obj.insert("description".to_string(), description.into());
        }
        schema
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Array(_) => "array",
            ParameterType::Object(_) => "object",
        }
    }

    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Integer => value.is_i64() || value.is_u64(),
            ParameterType::Number => value.is_number(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Array(_) => value.is_array(),
            ParameterType::Object(_) => value.is_object(),
        }
    }
}

fn object_schema(props: &[ParameterSchema], description: Option<&str>) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for param in props {
        properties.insert(param.name.clone(), param.to_json_schema());
        if param.required {
            required.push(param.name.clone());
        }
    }

    let mut schema = serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    });
    if let (Some(description), Some(obj)) = (description, schema.as_object_mut()) {
        obj.insert("description".to_string(), description.into());
    }
    schema
}

impl ToolResult {
    pub fn new(title: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            title: title.into(),
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location_declaration() -> ToolDeclaration {
        ToolDeclaration::new("fetchWeather", "Get the weather.")
            .with_parameter(ParameterSchema::required(
                "location",
                "City and state.",
                ParameterType::Object(vec![
                    ParameterSchema::required("city", "The city.", ParameterType::String),
                    ParameterSchema::required("state", "The state.", ParameterType::String),
                ]),
            ))
            .with_parameter(ParameterSchema::optional(
                "date",
                "YYYY-MM-DD",
                ParameterType::String,
            ))
    }

    #[test]
    fn test_nested_object_schema() {
        let schema = location_declaration().parameters_json();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["location"]));

        let location = &schema["properties"]["location"];
        assert_eq!(location["type"], "object");
        assert_eq!(location["description"], "City and state.");
        assert_eq!(location["properties"]["city"]["type"], "string");
        assert_eq!(location["required"], serde_json::json!(["city", "state"]));
    }

    #[test]
    fn test_function_declaration_shape() {
        let decl = location_declaration().to_function_declaration();
        assert_eq!(decl["name"], "fetchWeather");
        assert_eq!(decl["description"], "Get the weather.");
        assert_eq!(decl["parameters"]["properties"]["date"]["type"], "string");
    }

    #[test]
    fn test_parameter_type_matches() {
        assert!(ParameterType::String.matches(&serde_json::json!("x")));
        assert!(!ParameterType::String.matches(&serde_json::json!(1)));
        assert!(ParameterType::Integer.matches(&serde_json::json!(3)));
        assert!(!ParameterType::Integer.matches(&serde_json::json!(3.5)));
        assert!(ParameterType::Number.matches(&serde_json::json!(3.5)));
        assert!(ParameterType::Object(vec![]).matches(&serde_json::json!({})));
    }

    #[test]
    fn test_tool_error_display() {
        let err = ToolError::validation("fetchWeather", "Missing required parameter: location.city");
        assert_eq!(
            err.to_string(),
            "Invalid arguments for fetchWeather: Missing required parameter: location.city"
        );
    }
}
