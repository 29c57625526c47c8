use async_trait::async_trait;
use serde_json::Value;

pub mod context;
pub mod init;
pub mod registry;
pub mod types;
pub mod weather;

pub use context::ToolContext;
pub use init::initialize_tool_registry;
pub use registry::ToolRegistry;
pub use types::{ParameterSchema, ParameterType, ToolDeclaration, ToolError, ToolName, ToolResult};
pub use weather::{FetchWeatherTool, Location};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDeclaration;

    /// Hint shown on the in-flight model message while the tool runs.
    fn progress_hint(&self) -> String {
        format!("Tool: Running {}...", self.definition().name)
    }

    fn validate(&self, params: &Value) -> Result<(), ToolError> {
        let definition = self.definition();
        validate_params(params, &definition.parameters)
            .map_err(|reason| ToolError::validation(definition.name, reason))
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError>;
}

/// Checks `params` against a declared parameter list, recursing into nested
/// objects. The error names the offending field by its dotted path.
pub fn validate_params(params: &Value, schema: &[ParameterSchema]) -> Result<(), String> {
    validate_object(params, schema, "")
}

fn validate_object(value: &Value, schema: &[ParameterSchema], path: &str) -> Result<(), String> {
    let obj = value.as_object().ok_or_else(|| {
        if path.is_empty() {
            "Parameters must be an object".to_string()
        } else {
            format!("Parameter {} must be an object", path)
        }
    })?;

    for param in schema {
        let field_path = if path.is_empty() {
            param.name.clone()
        } else {
            format!("{}.{}", path, param.name)
        };

        let Some(field) = obj.get(&param.name).filter(|v| !v.is_null()) else {
            if param.required {
                return Err(format!("Missing required parameter: {}", field_path));
            }
            continue;
        };

        if !param.param_type.matches(field) {
            return Err(format!(
                "Parameter {} must be of type {}",
                field_path,
                param.param_type.type_name()
            ));
        }

        match &param.param_type {
            ParameterType::Object(props) => validate_object(field, props, &field_path)?,
            ParameterType::Array(inner) => {
                for (idx, item) in field.as_array().into_iter().flatten().enumerate() {
                    if !inner.matches(item) {
                        return Err(format!(
                            "Parameter {}[{}] must be of type {}",
                            field_path,
                            idx,
                            inner.type_name()
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(())
}

pub fn get_string_param(params: &Value, name: &str) -> Option<String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_object_param<'a>(params: &'a Value, name: &str) -> Option<&'a Value> {
    params.get(name).filter(|v| v.is_object())
}
