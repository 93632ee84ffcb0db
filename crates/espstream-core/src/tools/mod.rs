//! Tool registry and executor system

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::ToolDefinition;
use crate::backend::BackendClient;
use crate::error::ToolError;
use crate::room::RoomConnector;
use crate::session::SessionRegistry;

pub mod auth;
pub mod chat;
pub mod room;
pub mod stream;
pub mod system;

pub use auth::{LoginUserTool, RegisterUserTool};
pub use chat::{GetChatRequestsTool, RespondToChatRequestTool, SendChatRequestTool};
pub use room::{JoinChatRoomTool, LeaveChatRoomTool};
pub use stream::TestStreamFrameTool;
pub use system::GetSystemStatusTool;

/// Trait for executing tools
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool_name: &str, input: Value) -> Result<String, ToolError>;
    fn list_tools(&self) -> Vec<ToolDefinition>;
}

/// Individual tool handler
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<String, ToolError>;
}

/// Everything a tool needs to reach the backend and record its side effects
#[derive(Clone)]
pub struct ToolContext {
    pub backend: BackendClient,
    pub rooms: RoomConnector,
    pub sessions: Arc<SessionRegistry>,
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: HashMap<Arc<str>, Arc<dyn ToolHandler>>,
    order: Vec<Arc<str>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registry holding the full ESPStreamCloud tool catalog
    pub fn with_defaults(ctx: ToolContext) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RegisterUserTool::new(ctx.clone())));
        registry.register(Arc::new(LoginUserTool::new(ctx.clone())));
        registry.register(Arc::new(SendChatRequestTool::new(ctx.clone())));
        registry.register(Arc::new(GetChatRequestsTool::new(ctx.clone())));
        registry.register(Arc::new(RespondToChatRequestTool::new(ctx.clone())));
        registry.register(Arc::new(JoinChatRoomTool::new(ctx.clone())));
        registry.register(Arc::new(LeaveChatRoomTool::new(ctx.clone())));
        registry.register(Arc::new(TestStreamFrameTool::new(ctx.clone())));
        registry.register(Arc::new(GetSystemStatusTool::new(ctx)));
        registry
    }

    /// Register a tool handler
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name: Arc<str> = Arc::from(handler.name());
        debug!("Registering tool: {}", name);
        if self.tools.insert(name.clone(), handler).is_none() {
            self.order.push(name);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, tool_name: &str, input: Value) -> Result<String, ToolError> {
        let handler = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        validate_arguments(&handler.input_schema(), &input)?;
        debug!("Executing tool: {}", tool_name);

        match handler.execute(input).await {
            Ok(result) => {
                debug!("Tool {} succeeded", tool_name);
                Ok(result)
            }
            Err(e) => {
                warn!("Tool {} failed ({}): {}", tool_name, e.kind(), e);
                Err(e)
            }
        }
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|handler| ToolDefinition {
                name: handler.name().to_string(),
                description: handler.description().to_string(),
                input_schema: handler.input_schema(),
            })
            .collect()
    }
}

/// Helper function to create a JSON schema for tool input
pub fn json_schema(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Check an argument bag against a tool's schema: the bag must be an object
/// (or null when nothing is required), every `required` field must be present
/// and non-null, and `string`/`boolean`/`number` typed properties (or a
/// list of those) must match.
pub fn validate_arguments(schema: &Value, input: &Value) -> Result<(), ToolError> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let empty = serde_json::Map::new();
    let args = match input {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ToolError::Validation(format!(
                "Arguments must be an object, got {}",
                json_type_name(other)
            )));
        }
    };

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|field| args.get(*field).is_none_or(Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(ToolError::Validation(format!(
            "Missing required argument(s): {}",
            missing.join(", ")
        )));
    }

    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (field, value) in args {
            if value.is_null() {
                continue;
            }
            let expected: Vec<&str> = match props.get(field).and_then(|p| p.get("type")) {
                Some(Value::String(t)) => vec![t.as_str()],
                Some(Value::Array(ts)) => ts.iter().filter_map(|t| t.as_str()).collect(),
                _ => continue,
            };
            if !expected.is_empty() && !expected.iter().any(|t| type_matches(t, value)) {
                return Err(ToolError::Validation(format!(
                    "Argument '{}' must be a {}, got {}",
                    field,
                    expected.join(" or "),
                    json_type_name(value)
                )));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "number" => value.is_number(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Fetch a string argument that validation already guaranteed
pub(crate) fn str_arg<'a>(input: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::Validation(format!("Missing '{}' parameter", key)))
}

/// Fetch an identifier that may arrive as a JSON string or number, keeping
/// its original type
pub(crate) fn id_arg<'a>(input: &'a Value, key: &str) -> Result<&'a Value, ToolError> {
    input
        .get(key)
        .filter(|v| v.is_string() || v.is_number())
        .ok_or_else(|| ToolError::Validation(format!("Missing '{}' parameter", key)))
}

pub(crate) fn bool_arg(input: &Value, key: &str) -> Result<bool, ToolError> {
    input
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| ToolError::Validation(format!("Missing '{}' parameter", key)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct DummyTool;

    #[async_trait]
    impl ToolHandler for DummyTool {
        fn name(&self) -> &str {
            "dummy"
        }

        fn description(&self) -> &str {
            "A dummy tool for testing"
        }

        fn input_schema(&self) -> Value {
            json_schema(
                serde_json::json!({
                    "message": {
                        "type": "string",
                        "description": "Test message"
                    },
                    "loud": {
                        "type": "boolean"
                    }
                }),
                vec!["message"],
            )
        }

        async fn execute(&self, _input: Value) -> Result<String, ToolError> {
            Ok("dummy result".to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl ToolHandler for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn input_schema(&self) -> Value {
            json_schema(serde_json::json!({}), vec![])
        }
        async fn execute(&self, _input: Value) -> Result<String, ToolError> {
            Err(ToolError::Transport("intentional failure".to_string()))
        }
    }

    #[tokio::test]
    async fn test_tool_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool));

        assert_eq!(registry.len(), 1);

        let result = registry
            .execute("dummy", serde_json::json!({"message": "test"}))
            .await;
        assert_eq!(result.unwrap(), "dummy result");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("nonexistent", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTool);
    }

    #[tokio::test]
    async fn test_missing_required_argument_fails_before_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool));

        let err = registry
            .execute("dummy", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("message"));
    }

    #[tokio::test]
    async fn test_null_argument_counts_as_missing() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool));

        let err = registry
            .execute("dummy", serde_json::json!({"message": null}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_registry_execute_failing_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool));

        let err = registry
            .execute("failing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("intentional failure"));
    }

    #[test]
    fn test_registry_default() {
        let registry = ToolRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_get() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool));

        assert!(registry.get("dummy").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_registry_overwrite() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(DummyTool));
        registry.register(Arc::new(DummyTool));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list_tools().len(), 1);
    }

    #[test]
    fn test_default_catalog_order() {
        let registry = ToolRegistry::with_defaults(test_support::unreachable_context());
        let names: Vec<String> = registry.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "register_user",
                "login_user",
                "send_chat_request",
                "get_chat_requests",
                "respond_to_chat_request",
                "join_chat_room",
                "leave_chat_room",
                "test_stream_frame",
                "get_system_status",
            ]
        );
    }

    #[test]
    fn test_validate_type_mismatch() {
        let schema = DummyTool.input_schema();
        let err = validate_arguments(&schema, &serde_json::json!({"message": 5})).unwrap_err();
        assert!(err.to_string().contains("must be a string"));

        let err = validate_arguments(
            &schema,
            &serde_json::json!({"message": "hi", "loud": "yes"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be a boolean"));
    }

    #[test]
    fn test_validate_union_type() {
        let schema = json_schema(
            serde_json::json!({"id": {"type": ["string", "number"]}}),
            vec!["id"],
        );
        assert!(validate_arguments(&schema, &serde_json::json!({"id": 7})).is_ok());
        assert!(validate_arguments(&schema, &serde_json::json!({"id": "7"})).is_ok());

        let err = validate_arguments(&schema, &serde_json::json!({"id": true})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("must be a string or number"));
    }

    #[test]
    fn test_validate_non_object_arguments() {
        let schema = json_schema(serde_json::json!({}), vec![]);
        assert!(validate_arguments(&schema, &Value::Null).is_ok());
        assert!(validate_arguments(&schema, &serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_validate_lists_all_missing_fields() {
        let schema = json_schema(
            serde_json::json!({"a": {"type": "string"}, "b": {"type": "string"}}),
            vec!["a", "b"],
        );
        let err = validate_arguments(&schema, &serde_json::json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Missing required argument(s): a, b");
    }

    #[test]
    fn test_json_schema_helper() {
        let schema = json_schema(
            serde_json::json!({
                "name": {"type": "string"},
                "age": {"type": "number"}
            }),
            vec!["name"],
        );
        assert_eq!(schema["type"], "object");
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0], "name");
    }

    #[test]
    fn test_str_and_bool_args() {
        let input = serde_json::json!({"s": "x", "b": false});
        assert_eq!(str_arg(&input, "s").unwrap(), "x");
        assert!(!bool_arg(&input, "b").unwrap());

        let ids = serde_json::json!({"n": 3, "s": "x", "b": true});
        assert_eq!(id_arg(&ids, "n").unwrap(), &serde_json::json!(3));
        assert_eq!(id_arg(&ids, "s").unwrap(), &serde_json::json!("x"));
        assert!(id_arg(&ids, "b").is_err());
        assert!(str_arg(&input, "b").is_err());
        assert!(bool_arg(&input, "missing").is_err());
    }
}
