//! MCP server implementation over STDIO
//!
//! Reads JSON-RPC requests from stdin, dispatches to handler, writes responses to stdout.

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::adapter::McpToolAdapter;
use crate::protocol::*;

/// MCP server that communicates over STDIO
pub struct McpServer {
    adapter: McpToolAdapter,
}

impl McpServer {
    /// Create a new MCP server wrapping a tool adapter
    pub fn new(adapter: McpToolAdapter) -> Self {
        Self { adapter }
    }

    /// Run the MCP server over STDIO (stdin/stdout)
    pub async fn serve_stdio(&self) -> Result<()> {
        info!("MCP server starting on STDIO");
        self.serve(BufReader::new(io::stdin()), io::stdout()).await?;
        info!("MCP server STDIO closed");
        Ok(())
    }

    /// Serve newline-delimited JSON-RPC until the reader hits EOF
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("MCP received: {}", preview(line));

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => {
                    warn!("Invalid JSON-RPC request: {}", e);
                    let err_response =
                        JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e));
                    write_response(&mut writer, &err_response).await?;
                    continue;
                }
            };

            if let Some(resp) = self.handle_request(request).await {
                write_response(&mut writer, &resp).await?;
            }
        }

        Ok(())
    }

    /// Handle a single JSON-RPC request
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => Some(to_response(id, &InitializeResult::current())),

            "notifications/initialized" => {
                info!("MCP client initialized");
                None
            }

            "tools/list" => {
                let tools = self.adapter.list_tools();
                info!("MCP tools/list: returning {} tools", tools.len());
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::json!({ "tools": tools }),
                ))
            }

            "tools/call" => {
                let name = request
                    .params
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(serde_json::json!({}));

                if name.is_empty() {
                    return Some(JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        "Missing 'name' parameter".to_string(),
                    ));
                }

                info!("MCP tools/call: {}", name);
                let result = self.adapter.call_tool(name, arguments).await;
                Some(to_response(id, &result))
            }

            "ping" => Some(JsonRpcResponse::success(id, serde_json::json!({}))),

            _ => {
                warn!("MCP unknown method: {}", request.method);
                // Notifications (no id) never get a response
                if request.id.is_none() {
                    None
                } else {
                    Some(JsonRpcResponse::error(
                        id,
                        METHOD_NOT_FOUND,
                        format!("Unknown method: {}", request.method),
                    ))
                }
            }
        }
    }
}

fn to_response<T: serde::Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Serialization failed: {}", e)),
    }
}

fn preview(s: &str) -> String {
    s.chars().take(200).collect()
}

/// Write a JSON-RPC response (newline-delimited)
async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<()> {
    let json = serde_json::to_string(response).context("Failed to serialize response")?;
    debug!("MCP sending: {}", preview(&json));
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
