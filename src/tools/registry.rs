use crate::tools::types::{ToolDeclaration, ToolName};
use crate::tools::ToolHandler;
use std::collections::HashMap;
use std::sync::Arc;

/// Name-keyed tool handlers. Populated once at startup, then shared behind an
/// `Arc` and never mutated again.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<ToolName, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) {
        let definition = tool.definition();
        self.tools.insert(definition.name, tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn ToolHandler>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations sorted by name so requests are stable across runs.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut declarations: Vec<ToolDeclaration> =
            self.tools.values().map(|t| t.definition()).collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
