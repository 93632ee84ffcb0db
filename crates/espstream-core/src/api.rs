//! Wire-facing tool description shared by the MCP server and the CLI

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name, description and JSON input schema of a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}
