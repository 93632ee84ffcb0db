//! HTTP client for the ESPStreamCloud backend REST API

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::BackendConfig;
use crate::error::ToolError;

/// Credentials body for register and login
#[derive(Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

impl std::fmt::Debug for AuthRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequestBody<'a> {
    receiver_username: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequestCreated {
    #[serde(default)]
    request_id: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RespondBody<'a> {
    request_id: &'a Value,
    accepted: bool,
}

#[derive(Debug, Default, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

/// A pending chat request as reported by the backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub sender_username: String,
    #[serde(default)]
    pub status: String,
}

impl ChatRequest {
    /// `ID: 7, From: alice, Status: pending`
    pub fn summary_line(&self) -> String {
        format!(
            "ID: {}, From: {}, Status: {}",
            display_value(&self.id),
            self.sender_username,
            self.status
        )
    }
}

/// Render a JSON scalar without quotes around strings
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "unknown".to_string(),
        other => other.to_string(),
    }
}

/// Client for the backend's auth, chat, stream and health endpoints
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /api/auth/register`, returns the issued token
    pub async fn register(&self, username: &str, password: &str) -> Result<String, ToolError> {
        debug!(username = username, "Backend register");
        let resp = self
            .http
            .post(self.url("/api/auth/register"))
            .json(&AuthRequest { username, password })
            .send()
            .await?;
        let body: TokenResponse = decode(resp).await?;
        Ok(body.token)
    }

    /// `POST /api/auth/login`, returns the issued token
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ToolError> {
        debug!(username = username, "Backend login");
        let resp = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&AuthRequest { username, password })
            .send()
            .await?;
        let body: TokenResponse = decode(resp).await?;
        Ok(body.token)
    }

    /// `POST /api/chat/request`, returns the new request id
    pub async fn send_chat_request(
        &self,
        token: &str,
        receiver_username: &str,
    ) -> Result<String, ToolError> {
        debug!(receiver = receiver_username, "Backend chat request");
        let resp = self
            .http
            .post(self.url("/api/chat/request"))
            .bearer_auth(token)
            .json(&ChatRequestBody { receiver_username })
            .send()
            .await?;
        let body: ChatRequestCreated = decode(resp).await?;
        Ok(display_value(&body.request_id))
    }

    /// `GET /api/chat/requests`
    pub async fn get_chat_requests(&self, token: &str) -> Result<Vec<ChatRequest>, ToolError> {
        let resp = self
            .http
            .get(self.url("/api/chat/requests"))
            .bearer_auth(token)
            .send()
            .await?;
        let requests: Vec<ChatRequest> = decode(resp).await?;
        debug!(count = requests.len(), "Backend chat requests");
        Ok(requests)
    }

    /// `POST /api/chat/respond`, returns the backend's message
    pub async fn respond_to_chat_request(
        &self,
        token: &str,
        request_id: &Value,
        accepted: bool,
    ) -> Result<String, ToolError> {
        debug!(request_id = %request_id, accepted = accepted, "Backend chat respond");
        let resp = self
            .http
            .post(self.url("/api/chat/respond"))
            .bearer_auth(token)
            .json(&RespondBody { request_id, accepted })
            .send()
            .await?;
        let body: MessageResponse = decode(resp).await?;
        Ok(body.message.unwrap_or_default())
    }

    /// `POST /api/stream/{userId}` with a raw JPEG body
    pub async fn stream_frame(
        &self,
        token: &str,
        user_id: &str,
        frame: Vec<u8>,
    ) -> Result<String, ToolError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ToolError::Transport(format!("Invalid backend URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ToolError::Transport("Backend URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["api", "stream", user_id]);

        debug!(user_id = user_id, bytes = frame.len(), "Backend stream frame");
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "image/jpeg")
            .body(frame)
            .send()
            .await?;
        let body: MessageResponse = decode(resp).await?;
        Ok(body.message.unwrap_or_default())
    }

    /// `GET /health`, arbitrary JSON
    pub async fn health(&self) -> Result<Value, ToolError> {
        let resp = self.http.get(self.url("/health")).send().await?;
        decode(resp).await
    }
}

/// Turn a backend response into `T`, or a `Remote` error carrying the
/// backend's `error` field
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ToolError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = error_message(&body, status);
        warn!("Backend returned {}: {}", status, message);
        return Err(ToolError::Remote {
            status: status.as_u16(),
            message,
        });
    }

    resp.json::<T>()
        .await
        .map_err(|e| ToolError::Transport(format!("Invalid backend response: {e}")))
}

/// The backend reports failures as `{"error": "..."}`; anything else gets a
/// generic status message
pub fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status))
}
