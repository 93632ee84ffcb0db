//! Chat room WebSocket connections
//!
//! A join opens a Bearer-authenticated WebSocket to the backend, sends a
//! `join_chat` message and hands back a [`RoomConnection`]. The handshake is
//! bounded by the configured join timeout; when the timeout wins, the pending
//! connection is dropped with it.

use anyhow::Result;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::ToolError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Serialize)]
struct JoinMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    room: &'a str,
}

/// A live room socket. Dropping it stops the reader task and releases the
/// socket; [`RoomConnection::close`] also sends a close frame first.
pub struct RoomConnection {
    room_id: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    reader: JoinHandle<()>,
    close_timeout: Duration,
}

impl std::fmt::Debug for RoomConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomConnection")
            .field("room_id", &self.room_id)
            .field("open", &self.is_open())
            .finish()
    }
}

impl RoomConnection {
    /// False once the server closed the socket or the read side failed
    pub fn is_open(&self) -> bool {
        !self.reader.is_finished()
    }

    /// Send a close frame and tear the connection down. A peer that stops
    /// reading gets at most `close_timeout` before the socket is dropped.
    pub async fn close(&self) {
        let handshake = async {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.send(Message::Close(None)).await {
                debug!("Room {} close frame not sent: {}", self.room_id, e);
            }
            let _ = sink.close().await;
        };
        if tokio::time::timeout(self.close_timeout, handshake)
            .await
            .is_err()
        {
            warn!(
                "Room {} close not acknowledged within {:?}",
                self.room_id, self.close_timeout
            );
        }
        self.reader.abort();
        info!("Closed room connection {}", self.room_id);
    }
}

impl Drop for RoomConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Opens room connections against the backend's WebSocket endpoint
#[derive(Debug, Clone)]
pub struct RoomConnector {
    ws_url: String,
    join_timeout: Duration,
}

impl RoomConnector {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self::with_url(config.ws_url()?, config.join_timeout()))
    }

    pub fn with_url(ws_url: impl Into<String>, join_timeout: Duration) -> Self {
        Self {
            ws_url: ws_url.into(),
            join_timeout,
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn join_timeout(&self) -> Duration {
        self.join_timeout
    }

    /// Open the socket, send `{"type":"join_chat","room":...}` and return the
    /// live connection
    pub async fn join(&self, room_id: &str, token: &str) -> Result<RoomConnection, ToolError> {
        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| ToolError::Protocol(format!("WebSocket connection failed: {e}")))?;
        let auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ToolError::Validation("token contains characters not allowed in a header".to_string())
        })?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        debug!("Connecting to {} for room {}", self.ws_url, room_id);

        let (stream, _response) =
            match tokio::time::timeout(self.join_timeout, connect_async(request)).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    warn!("Room {} WebSocket connection failed: {}", room_id, e);
                    return Err(ToolError::Protocol(format!(
                        "WebSocket connection failed: {e}"
                    )));
                }
                Err(_) => {
                    warn!("Room {} WebSocket connection timed out", room_id);
                    return Err(ToolError::Protocol(format!(
                        "WebSocket connection timeout after {:?}",
                        self.join_timeout
                    )));
                }
            };

        let (mut sink, stream) = stream.split();
        let join = serde_json::to_string(&JoinMessage {
            kind: "join_chat",
            room: room_id,
        })
        .map_err(|e| ToolError::Protocol(format!("Failed to encode join message: {e}")))?;
        sink.send(Message::Text(join.into()))
            .await
            .map_err(|e| ToolError::Protocol(format!("WebSocket send failed: {e}")))?;

        let reader = tokio::spawn(read_loop(room_id.to_string(), stream));
        info!("Joined chat room {}", room_id);

        Ok(RoomConnection {
            room_id: room_id.to_string(),
            sink: Mutex::new(sink),
            reader,
            close_timeout: self.join_timeout,
        })
    }
}

async fn read_loop(room_id: String, mut stream: SplitStream<WsStream>) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let preview: String = text.as_str().chars().take(200).collect();
                debug!("Room {} message: {}", room_id, preview);
            }
            Ok(Message::Close(_)) => {
                info!("Room {} closed by server", room_id);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Room {} WebSocket error: {}", room_id, e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_join_message_shape() {
        let json = serde_json::to_value(JoinMessage {
            kind: "join_chat",
            room: "room-1",
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "join_chat", "room": "room-1"}));
    }

    #[test]
    fn test_connector_from_config() {
        let config = BackendConfig {
            api_base_url: "https://chat.example.com".to_string(),
            ..BackendConfig::default()
        };
        let connector = RoomConnector::new(&config).unwrap();
        assert_eq!(connector.ws_url(), "wss://chat.example.com");
        assert_eq!(connector.join_timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_join_connection_refused() {
        let connector = RoomConnector::with_url("ws://127.0.0.1:1", Duration::from_secs(5));
        let err = connector.join("room-1", "tok").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("WebSocket connection failed"));
    }

    #[tokio::test]
    async fn test_join_times_out_on_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let connector =
            RoomConnector::with_url(format!("ws://{addr}"), Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = connector.join("room-1", "tok").await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("timeout"));
    }

    /// WebSocket server that accepts one client and reads until it goes away
    async fn spawn_echo_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn test_server_hangup_marks_connection_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            // Read the join, then hang up
            let _ = ws.next().await;
        });

        let connector = RoomConnector::with_url(format!("ws://{addr}"), Duration::from_secs(2));
        let conn = connector.join("room-1", "tok").await.unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while conn.is_open() && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_close_is_bounded_when_sink_is_stuck() {
        let url = spawn_echo_server().await;
        let connector = RoomConnector::with_url(url, Duration::from_millis(200));
        let conn = connector.join("room-1", "tok").await.unwrap();
        assert!(conn.is_open());

        // Hold the sink so the close frame can never go out
        let held = conn.sink.lock().await;
        let started = std::time::Instant::now();
        conn.close().await;
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(held);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_join_rejects_header_unsafe_token() {
        let connector = RoomConnector::with_url("ws://127.0.0.1:1", Duration::from_secs(1));
        let err = connector.join("room-1", "bad\ntoken").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
