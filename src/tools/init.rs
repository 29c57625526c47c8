use crate::tools::{FetchWeatherTool, ToolRegistry};
use std::sync::Arc;

pub fn initialize_tool_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(FetchWeatherTool::new()));

    registry
}
