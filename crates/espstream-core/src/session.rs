//! Session registry: credentials by username, room sockets by room id
//!
//! Both maps live behind `RwLock`s and are written as a side effect of tool
//! calls. Concurrent writes to the same key are last-write-wins.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::room::RoomConnection;

/// Number of token characters shown in listings
pub const TOKEN_PREFIX_LEN: usize = 20;

/// A user known to this process
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub token: String,
    /// Held so a re-login is possible without asking again
    pub password: String,
    pub issued_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("token", &redact_token(&self.token))
            .field("password", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Listing form of a credential
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RedactedUser {
    pub username: String,
    pub token: String,
}

/// First [`TOKEN_PREFIX_LEN`] characters of a token followed by `...`
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(TOKEN_PREFIX_LEN).collect();
    format!("{}...", prefix)
}

/// In-memory registry shared by the tools and the HTTP gateway
#[derive(Default)]
pub struct SessionRegistry {
    users: RwLock<HashMap<String, Credential>>,
    connections: RwLock<HashMap<String, RoomConnection>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the credential for `username`
    pub async fn put_user(&self, username: &str, token: &str, password: &str) {
        let credential = Credential {
            username: username.to_string(),
            token: token.to_string(),
            password: password.to_string(),
            issued_at: Utc::now(),
        };
        let mut users = self.users.write().await;
        if users.insert(username.to_string(), credential).is_some() {
            debug!("Replaced credential for {}", username);
        } else {
            debug!("Stored credential for {}", username);
        }
    }

    pub async fn get_user(&self, username: &str) -> Option<Credential> {
        self.users.read().await.get(username).cloned()
    }

    /// All known users with tokens cut to a prefix, sorted by username
    pub async fn get_all_users(&self) -> Vec<RedactedUser> {
        let users = self.users.read().await;
        let mut list: Vec<RedactedUser> = users
            .values()
            .map(|c| RedactedUser {
                username: c.username.clone(),
                token: redact_token(&c.token),
            })
            .collect();
        list.sort_by(|a, b| a.username.cmp(&b.username));
        list
    }

    pub async fn remove_user(&self, username: &str) -> bool {
        let removed = self.users.write().await.remove(username).is_some();
        if removed {
            info!("Removed credential for {}", username);
        }
        removed
    }

    /// Drop credentials issued more than `ttl` ago, returns how many went
    pub async fn prune_expired(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|_, c| c.issued_at > cutoff);
        let pruned = before - users.len();
        if pruned > 0 {
            info!("Pruned {} expired credential(s)", pruned);
        }
        pruned
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Register a room socket. A previous socket for the same room is closed,
    /// bounded by its close timeout.
    pub async fn put_connection(&self, room_id: &str, connection: RoomConnection) {
        let replaced = self
            .connections
            .write()
            .await
            .insert(room_id.to_string(), connection);
        if let Some(old) = replaced {
            info!("Replacing existing connection for room {}", room_id);
            old.close().await;
        }
    }

    pub async fn take_connection(&self, room_id: &str) -> Option<RoomConnection> {
        self.connections.write().await.remove(room_id)
    }

    /// Remove and close the socket for `room_id`
    pub async fn close_connection(&self, room_id: &str) -> bool {
        match self.take_connection(room_id).await {
            Some(conn) => {
                conn.close().await;
                true
            }
            None => false,
        }
    }

    /// Drop sockets the server has already closed, returns how many went
    pub async fn evict_closed(&self) -> usize {
        let mut connections = self.connections.write().await;
        let before = connections.len();
        connections.retain(|room_id, conn| {
            let open = conn.is_open();
            if !open {
                info!("Room {} connection closed by server, evicting", room_id);
            }
            open
        });
        before - connections.len()
    }

    /// Room ids with a live socket, sorted
    pub async fn list_connection_keys(&self) -> Vec<String> {
        self.evict_closed().await;
        let mut keys: Vec<String> = self.connections.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn connection_count(&self) -> usize {
        self.evict_closed().await;
        self.connections.read().await.len()
    }

    /// Close every room socket
    pub async fn close_all(&self) {
        let drained: Vec<RoomConnection> = {
            let mut connections = self.connections.write().await;
            connections.drain().map(|(_, c)| c).collect()
        };
        if !drained.is_empty() {
            info!("Closing {} room connection(s)", drained.len());
        }
        for conn in drained {
            conn.close().await;
        }
    }

    /// Periodically prune credentials older than `ttl` and evict dead room
    /// sockets until `cancel` fires
    pub fn spawn_pruner(
        self: &Arc<Self>,
        ttl: Duration,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.prune_expired(ttl).await;
                        registry.evict_closed().await;
                    }
                }
            }
            debug!("Credential pruner stopped");
        })
    }
}
