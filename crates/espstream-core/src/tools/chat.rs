//! Chat request tools: send, list and answer chat requests

use async_trait::async_trait;
use serde_json::Value;

use super::{ToolContext, ToolHandler, bool_arg, id_arg, json_schema, str_arg};
use crate::backend::ChatRequest;
use crate::error::ToolError;

/// Text returned when a user has nothing pending
pub const NO_PENDING_REQUESTS: &str = "No pending requests";

/// Render a chat request listing
pub fn format_chat_requests(requests: &[ChatRequest]) -> String {
    if requests.is_empty() {
        return NO_PENDING_REQUESTS.to_string();
    }
    let rows: Vec<String> = requests.iter().map(ChatRequest::summary_line).collect();
    format!("Chat requests:\n{}", rows.join("\n"))
}

pub struct SendChatRequestTool {
    ctx: ToolContext,
}

impl SendChatRequestTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for SendChatRequestTool {
    fn name(&self) -> &str {
        "send_chat_request"
    }

    fn description(&self) -> &str {
        "Send a chat request to another user"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "receiverUsername": {
                    "type": "string",
                    "description": "Username of the user to send request to"
                },
                "senderToken": {
                    "type": "string",
                    "description": "JWT token of the sender"
                }
            }),
            vec!["receiverUsername", "senderToken"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let receiver = str_arg(&input, "receiverUsername")?;
        let token = str_arg(&input, "senderToken")?;

        let request_id = self
            .ctx
            .backend
            .send_chat_request(token, receiver)
            .await
            .map_err(|e| e.context("Chat request failed"))?;

        Ok(format!(
            "Chat request sent to {}. Request ID: {}",
            receiver, request_id
        ))
    }
}

pub struct GetChatRequestsTool {
    ctx: ToolContext,
}

impl GetChatRequestsTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for GetChatRequestsTool {
    fn name(&self) -> &str {
        "get_chat_requests"
    }

    fn description(&self) -> &str {
        "Get pending chat requests for a user"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "token": {
                    "type": "string",
                    "description": "JWT token of the user"
                }
            }),
            vec!["token"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let token = str_arg(&input, "token")?;

        let requests = self
            .ctx
            .backend
            .get_chat_requests(token)
            .await
            .map_err(|e| e.context("Failed to get chat requests"))?;

        Ok(format_chat_requests(&requests))
    }
}

pub struct RespondToChatRequestTool {
    ctx: ToolContext,
}

impl RespondToChatRequestTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for RespondToChatRequestTool {
    fn name(&self) -> &str {
        "respond_to_chat_request"
    }

    fn description(&self) -> &str {
        "Accept or reject a chat request"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "requestId": {
                    "type": ["string", "number"],
                    "description": "ID of the chat request, as issued by the backend"
                },
                "accepted": {
                    "type": "boolean",
                    "description": "Whether to accept or reject the request"
                },
                "token": {
                    "type": "string",
                    "description": "JWT token of the responder"
                }
            }),
            vec!["requestId", "accepted", "token"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let request_id = id_arg(&input, "requestId")?;
        let accepted = bool_arg(&input, "accepted")?;
        let token = str_arg(&input, "token")?;

        let message = self
            .ctx
            .backend
            .respond_to_chat_request(token, request_id, accepted)
            .await
            .map_err(|e| e.context("Failed to respond to chat request"))?;

        let verdict = if accepted { "accepted" } else { "rejected" };
        Ok(format!("Chat request {}. {}", verdict, message))
    }
}
