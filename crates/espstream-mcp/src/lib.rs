//! MCP (Model Context Protocol) server for the ESPStreamCloud proxy
//!
//! Exposes the core tool registry to MCP clients over STDIO.

pub mod adapter;
pub mod protocol;
pub mod server;

pub use adapter::McpToolAdapter;
pub use server::McpServer;
