//! HTTP handlers for the gateway

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use espstream_core::session::RedactedUser;
use espstream_core::{BackendClient, SERVICE_NAME, SessionRegistry, ToolError};

/// Shared handler state
#[derive(Clone)]
pub struct GatewayState {
    pub backend: BackendClient,
    pub sessions: Arc<SessionRegistry>,
}

impl GatewayState {
    pub fn new(backend: BackendClient, sessions: Arc<SessionRegistry>) -> Self {
        Self { backend, sessions }
    }
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
}

/// Any failure is reported as `400 {error}`
#[derive(Debug)]
pub struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.0 }))).into_response()
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        Self(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(rejection.body_text())
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn test_users(State(state): State<GatewayState>) -> Json<Vec<RedactedUser>> {
    Json(state.sessions.get_all_users().await)
}

pub async fn active_connections(State(state): State<GatewayState>) -> Json<Vec<String>> {
    Json(state.sessions.list_connection_keys().await)
}

pub async fn register(
    State(state): State<GatewayState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(creds) = body?;
    let token = state
        .backend
        .register(&creds.username, &creds.password)
        .await
        .inspect_err(|e| warn!("Gateway register for {} failed: {}", creds.username, e))?;
    remember(&state, &creds, token).await
}

pub async fn login(
    State(state): State<GatewayState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(creds) = body?;
    let token = state
        .backend
        .login(&creds.username, &creds.password)
        .await
        .inspect_err(|e| warn!("Gateway login for {} failed: {}", creds.username, e))?;
    remember(&state, &creds, token).await
}

async fn remember(
    state: &GatewayState,
    creds: &Credentials,
    token: String,
) -> Result<Json<TokenResponse>, ApiError> {
    state
        .sessions
        .put_user(&creds.username, &token, &creds.password)
        .await;
    info!("Gateway stored token for {}", creds.username);
    Ok(Json(TokenResponse {
        success: true,
        token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::GatewayServer;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use espstream_core::config::BackendConfig;
    use serde_json::Value;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    fn state_for(base_url: &str) -> GatewayState {
        let config = BackendConfig {
            api_base_url: base_url.to_string(),
            ..BackendConfig::default()
        };
        GatewayState::new(
            BackendClient::new(&config).unwrap(),
            Arc::new(SessionRegistry::new()),
        )
    }

    async fn call(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(path: &str) -> Request<Body> {
        Request::get(path).body(Body::empty()).unwrap()
    }

    fn post_json(path: &str, body: &str) -> Request<Body> {
        Request::post(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Backend that accepts any registration/login and returns a fixed token
    async fn spawn_token_backend() -> String {
        let app = Router::new()
            .route(
                "/api/auth/register",
                post(|| async { axum::Json(serde_json::json!({"token": "tok-abcdefghijklmnopqrstuvwxyz"})) }),
            )
            .route(
                "/api/auth/login",
                post(|| async {
                    (
                        StatusCode::UNAUTHORIZED,
                        axum::Json(serde_json::json!({"error": "Invalid credentials"})),
                    )
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health() {
        let server = GatewayServer::new("127.0.0.1:0", state_for("http://127.0.0.1:1"));
        let (status, body) = call(server.router(), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "espstreamcloud-mcp-server");
        let ts = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[tokio::test]
    async fn test_listings_reflect_registry() {
        let state = state_for("http://127.0.0.1:1");
        state
            .sessions
            .put_user("bob", "0123456789abcdefghijKLMNOP", "pw")
            .await;
        state.sessions.put_user("alice", "short", "pw").await;
        let server = GatewayServer::new("127.0.0.1:0", state);

        let (status, body) = call(server.router(), get_req("/test-users")).await;
        assert_eq!(status, StatusCode::OK);
        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0]["username"], "alice");
        assert_eq!(users[1]["username"], "bob");
        assert_eq!(users[1]["token"], "0123456789abcdefghij...");
        assert!(!body.to_string().contains("\"pw\""));

        let (status, body) = call(server.router(), get_req("/active-connections")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_register_success_updates_registry() {
        let base = spawn_token_backend().await;
        let state = state_for(&base);
        let sessions = Arc::clone(&state.sessions);
        let server = GatewayServer::new("127.0.0.1:0", state);

        let (status, body) = call(
            server.router(),
            post_json("/test/register", r#"{"username":"carol","password":"pw"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["token"], "tok-abcdefghijklmnopqrstuvwxyz");

        let stored = sessions.get_user("carol").await.unwrap();
        assert_eq!(stored.token, "tok-abcdefghijklmnopqrstuvwxyz");
    }

    #[tokio::test]
    async fn test_login_backend_error_is_400() {
        let base = spawn_token_backend().await;
        let state = state_for(&base);
        let sessions = Arc::clone(&state.sessions);
        let server = GatewayServer::new("127.0.0.1:0", state);

        let (status, body) = call(
            server.router(),
            post_json("/test/login", r#"{"username":"carol","password":"bad"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid credentials");
        assert_eq!(sessions.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_unreachable_backend_is_400() {
        let server = GatewayServer::new("127.0.0.1:0", state_for("http://127.0.0.1:1"));
        let (status, body) = call(
            server.router(),
            post_json("/test/register", r#"{"username":"dave","password":"pw"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let server = GatewayServer::new("127.0.0.1:0", state_for("http://127.0.0.1:1"));
        let (status, body) = call(
            server.router(),
            post_json("/test/login", r#"{"username":"erin"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
