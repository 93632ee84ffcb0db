//! Room tools: `join_chat_room` and `leave_chat_room`

use async_trait::async_trait;
use serde_json::Value;

use super::{ToolContext, ToolHandler, json_schema, str_arg};
use crate::error::ToolError;

pub struct JoinChatRoomTool {
    ctx: ToolContext,
}

impl JoinChatRoomTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for JoinChatRoomTool {
    fn name(&self) -> &str {
        "join_chat_room"
    }

    fn description(&self) -> &str {
        "Join a chat room and start video streaming"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "roomId": {
                    "type": "string",
                    "description": "Chat room ID to join"
                },
                "token": {
                    "type": "string",
                    "description": "JWT token of the user"
                }
            }),
            vec!["roomId", "token"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let room_id = str_arg(&input, "roomId")?;
        let token = str_arg(&input, "token")?;

        let connection = self
            .ctx
            .rooms
            .join(room_id, token)
            .await
            .map_err(|e| e.context("Failed to join chat room"))?;
        self.ctx.sessions.put_connection(room_id, connection).await;

        Ok(format!("Successfully joined chat room: {}", room_id))
    }
}

/// Close a room socket opened by `join_chat_room`
pub struct LeaveChatRoomTool {
    ctx: ToolContext,
}

impl LeaveChatRoomTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for LeaveChatRoomTool {
    fn name(&self) -> &str {
        "leave_chat_room"
    }

    fn description(&self) -> &str {
        "Leave a chat room and close its WebSocket connection"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "roomId": {
                    "type": "string",
                    "description": "Chat room ID to leave"
                }
            }),
            vec!["roomId"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let room_id = str_arg(&input, "roomId")?;

        if self.ctx.sessions.close_connection(room_id).await {
            Ok(format!("Left chat room: {}", room_id))
        } else {
            Err(ToolError::NotConnected(room_id.to_string()))
        }
    }
}
