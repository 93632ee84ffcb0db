//! `get_system_status`: backend health plus local registry counts

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{ToolContext, ToolHandler, json_schema};
use crate::error::ToolError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub api_health: Value,
    pub active_connections: usize,
    pub test_users: usize,
    pub timestamp: String,
}

pub struct GetSystemStatusTool {
    ctx: ToolContext,
}

impl GetSystemStatusTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    pub async fn status(&self) -> Result<SystemStatus, ToolError> {
        let api_health = self
            .ctx
            .backend
            .health()
            .await
            .map_err(|e| e.context("Failed to get system status"))?;

        Ok(SystemStatus {
            api_health,
            active_connections: self.ctx.sessions.connection_count().await,
            test_users: self.ctx.sessions.user_count().await,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

#[async_trait]
impl ToolHandler for GetSystemStatusTool {
    fn name(&self) -> &str {
        "get_system_status"
    }

    fn description(&self) -> &str {
        "Get overall system status and health"
    }

    fn input_schema(&self) -> Value {
        json_schema(serde_json::json!({}), vec![])
    }

    async fn execute(&self, _input: Value) -> Result<String, ToolError> {
        let status = self.status().await?;
        serde_json::to_string_pretty(&status)
            .map_err(|e| ToolError::Transport(format!("Failed to encode system status: {e}")))
    }
}
