//! `test_stream_frame`: push one base64-encoded JPEG frame to the stream API

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tracing::debug;

use super::{ToolContext, ToolHandler, json_schema, str_arg};
use crate::error::ToolError;

/// Decode a base64 frame, tolerating a `data:image/jpeg;base64,` prefix and
/// embedded whitespace
pub fn decode_frame(frame_data: &str) -> Result<Vec<u8>, ToolError> {
    let payload = match frame_data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => frame_data,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(ToolError::Validation("frameData is empty".to_string()));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ToolError::Validation(format!("frameData is not valid base64: {e}")))
}

pub struct TestStreamFrameTool {
    ctx: ToolContext,
}

impl TestStreamFrameTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for TestStreamFrameTool {
    fn name(&self) -> &str {
        "test_stream_frame"
    }

    fn description(&self) -> &str {
        "Test sending a video frame to the streaming API"
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "userId": {
                    "type": "string",
                    "description": "User ID for the stream"
                },
                "token": {
                    "type": "string",
                    "description": "JWT token of the user"
                },
                "frameData": {
                    "type": "string",
                    "description": "Base64 encoded frame data"
                }
            }),
            vec!["userId", "token", "frameData"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let user_id = str_arg(&input, "userId")?;
        let token = str_arg(&input, "token")?;
        let frame = decode_frame(str_arg(&input, "frameData")?)?;
        debug!("Decoded {} byte frame for {}", frame.len(), user_id);

        let message = self
            .ctx
            .backend
            .stream_frame(token, user_id, frame)
            .await
            .map_err(|e| e.context("Failed to send frame"))?;

        Ok(format!("Frame sent successfully. Response: {}", message))
    }
}
