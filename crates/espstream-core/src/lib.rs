//! espstream-core: the pass-through layer of the ESPStreamCloud MCP proxy
//!
//! Holds the backend HTTP client, the room WebSocket connector, the in-memory
//! session registry and the tool handlers that tie them together.

/// Service name reported by the MCP handshake and the gateway health check
pub const SERVICE_NAME: &str = "espstreamcloud-mcp-server";

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod room;
pub mod session;
pub mod tools;

pub use backend::BackendClient;
pub use config::Config;
pub use error::{ErrorKind, ToolError};
pub use room::{RoomConnection, RoomConnector};
pub use session::SessionRegistry;
pub use tools::{ToolContext, ToolExecutor, ToolHandler, ToolRegistry};
