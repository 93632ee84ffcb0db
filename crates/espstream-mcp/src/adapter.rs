//! Adapter between the core ToolRegistry and MCP protocol

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use espstream_core::tools::{ToolExecutor, ToolRegistry};

use crate::protocol::{McpTool, ToolCallResult};

/// Adapts the ToolRegistry to MCP tool format
pub struct McpToolAdapter {
    registry: Arc<ToolRegistry>,
}

impl McpToolAdapter {
    /// Create a new adapter wrapping a ToolRegistry
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// List all tools as MCP tool definitions
    pub fn list_tools(&self) -> Vec<McpTool> {
        self.registry
            .list_tools()
            .into_iter()
            .map(|t| McpTool {
                name: t.name,
                description: t.description,
                input_schema: t.input_schema,
            })
            .collect()
    }

    /// Execute a tool and return MCP-formatted result. Failures come back
    /// with `isError` set and the error kind under `_meta`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolCallResult {
        debug!("MCP calling tool: {}", name);
        match self.registry.execute(name, arguments).await {
            Ok(text) => ToolCallResult::text(text),
            Err(e) => ToolCallResult::error(
                format!("Error executing {}: {}", name, e),
                &e.kind().to_string(),
            ),
        }
    }
}
