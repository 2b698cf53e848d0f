//! Tool registry for managing and executing tools.
//!
//! The registry provides:
//! - Tool registration in a stable listing order
//! - Tool lookup by name
//! - Conversion to MCP `tools/list` descriptors
//! - Error-to-result conversion at the tool boundary

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::logging;

use super::spec::{ToolContext, ToolError, ToolResult, ToolSpec};

// === Types ===

/// Tool entry as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Registry that holds all available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolSpec>>,
    order: Vec<String>,
    context: ToolContext,
}

impl ToolRegistry {
    /// Create a new empty registry with the given context.
    #[must_use]
    pub fn new(context: ToolContext) -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            context,
        }
    }

    /// Register a tool in the registry.
    pub fn register(&mut self, tool: Arc<dyn ToolSpec>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Overwriting existing tool: {}", name);
        } else {
            self.order.push(name);
        }
    }

    /// Register multiple tools at once.
    pub fn register_all(&mut self, tools: Vec<Arc<dyn ToolSpec>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolSpec>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.tools.len()
    }

    /// Get all registered tools in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn ToolSpec>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    /// Execute a tool by name, returning the tool's own result or error.
    pub async fn execute(&self, name: &str, input: Value) -> Result<ToolResult, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::not_available(name))?;

        tool.execute(input, &self.context).await
    }

    /// Execute a registered tool and fold any failure into `{success:false, error}`.
    ///
    /// Callers must check [`ToolRegistry::contains`] first; an unknown name is
    /// folded the same way.
    pub async fn call(&self, name: &str, input: Value) -> ToolResult {
        match self.execute(name, input).await {
            Ok(result) => result,
            Err(err) => {
                logging::warn(format!("Tool {name} failed: {err}"));
                ToolResult::error(err.to_string())
            }
        }
    }

    /// Descriptors for `tools/list`.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.all()
            .iter()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }
}

/// Builder for constructing a `ToolRegistry`.
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn ToolSpec>>,
}

impl ToolRegistryBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Include the media tools (`generate_image`, `image_to_image`,
    /// `download_image`, `generate_video`, `query_video_task`).
    #[must_use]
    pub fn with_media_tools(mut self) -> Self {
        self.tools.extend(super::media::media_tools());
        self
    }

    /// Build the registry with the given context.
    #[must_use]
    pub fn build(self, context: ToolContext) -> ToolRegistry {
        let mut registry = ToolRegistry::new(context);
        registry.register_all(self.tools);
        registry
    }
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// === Unit Tests ===
