//! Tool error taxonomy
//!
//! Every tool returns `Result<String, ToolError>`. The variant decides the
//! [`ErrorKind`] tag that callers use to tell failures apart.

use serde::Serialize;
use thiserror::Error;

/// Coarse failure category exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UnknownTool,
    Remote,
    Transport,
    Protocol,
    NotConnected,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::Remote => "remote",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::NotConnected => "not_connected",
        };
        f.write_str(s)
    }
}

/// Errors produced while executing a tool
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Validation(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The backend answered with a non-success status
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Protocol(String),

    #[error("Not connected to chat room: {0}")]
    NotConnected(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Validation(_) => ErrorKind::Validation,
            ToolError::UnknownTool(_) => ErrorKind::UnknownTool,
            ToolError::Remote { .. } => ErrorKind::Remote,
            ToolError::Transport(_) => ErrorKind::Transport,
            ToolError::Protocol(_) => ErrorKind::Protocol,
            ToolError::NotConnected(_) => ErrorKind::NotConnected,
        }
    }

    /// Prefix the message with the failing operation, keeping the kind
    pub fn context(self, prefix: &str) -> Self {
        match self {
            ToolError::Validation(m) => ToolError::Validation(format!("{prefix}: {m}")),
            ToolError::Remote { status, message } => ToolError::Remote {
                status,
                message: format!("{prefix}: {message}"),
            },
            ToolError::Transport(m) => ToolError::Transport(format!("{prefix}: {m}")),
            ToolError::Protocol(m) => ToolError::Protocol(format!("{prefix}: {m}")),
            other => other,
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        ToolError::Transport(err.to_string())
    }
}
