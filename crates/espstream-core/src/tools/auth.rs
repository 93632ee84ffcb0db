//! Account tools: `register_user` and `login_user`
//!
//! Both store the issued token in the session registry so the status tool
//! and the gateway listings can report it. A login the backend refuses with
//! 401 drops whatever credential was stored for that user.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{ToolContext, ToolHandler, json_schema, str_arg};
use crate::error::ToolError;
use crate::session::redact_token;

fn credentials_schema(action: &str) -> Value {
    json_schema(
        serde_json::json!({
            "username": {
                "type": "string",
                "description": format!("Username {}", action)
            },
            "password": {
                "type": "string",
                "description": "Password for the account"
            }
        }),
        vec!["username", "password"],
    )
}

/// Register a new account with the backend
pub struct RegisterUserTool {
    ctx: ToolContext,
}

impl RegisterUserTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for RegisterUserTool {
    fn name(&self) -> &str {
        "register_user"
    }

    fn description(&self) -> &str {
        "Register a new user in the ESPStreamCloud system"
    }

    fn input_schema(&self) -> Value {
        credentials_schema("for the new account")
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let username = str_arg(&input, "username")?;
        let password = str_arg(&input, "password")?;

        let token = self
            .ctx
            .backend
            .register(username, password)
            .await
            .map_err(|e| e.context("Registration failed"))?;

        self.ctx.sessions.put_user(username, &token, password).await;
        info!("Registered user {}", username);

        Ok(format!(
            "User {} registered successfully. Token: {}",
            username,
            redact_token(&token)
        ))
    }
}

/// Log an existing account in and remember its token
pub struct LoginUserTool {
    ctx: ToolContext,
}

impl LoginUserTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for LoginUserTool {
    fn name(&self) -> &str {
        "login_user"
    }

    fn description(&self) -> &str {
        "Login an existing user and get JWT token"
    }

    fn input_schema(&self) -> Value {
        credentials_schema("to login")
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let username = str_arg(&input, "username")?;
        let password = str_arg(&input, "password")?;

        let token = match self.ctx.backend.login(username, password).await {
            Ok(token) => token,
            Err(e) => {
                // A stored credential the backend now refuses is stale
                if matches!(e, ToolError::Remote { status: 401, .. }) {
                    self.ctx.sessions.remove_user(username).await;
                }
                return Err(e.context("Login failed"));
            }
        };

        self.ctx.sessions.put_user(username, &token, password).await;
        info!("Logged in user {}", username);

        Ok(format!(
            "User {} logged in successfully. Token: {}",
            username,
            redact_token(&token)
        ))
    }
}
