//! In-memory connection registry and channel-backed transport
//!
//! Each upgraded socket is drained by its own writer task; the transport only
//! pushes frames into that task's bounded queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::broadcast::{
    ConnectionRegistry, RegistryError, RegistryResult, SendError, SendResult, Transport,
};
use crate::types::{ClientEntry, ConnectionHandle, ConnectionKind, Frame, TriggerContext};

struct Connection {
    peer: SocketAddr,
    kind: ConnectionKind,
    outbound: Option<mpsc::Sender<Frame>>,
    connected_at: DateTime<Utc>,
}

struct TableInner {
    connections: BTreeMap<ConnectionHandle, Connection>,
    closed: bool,
}

/// Public view of one registered connection
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub handle: ConnectionHandle,
    pub peer: SocketAddr,
    pub kind: ConnectionKind,
    pub connected_at: DateTime<Utc>,
}

/// Registry of connections known to the server, capped at `max_clients`
#[derive(Clone)]
pub struct ConnectionTable {
    inner: Arc<RwLock<TableInner>>,
    next_id: Arc<AtomicU64>,
    max_clients: usize,
}

impl ConnectionTable {
    pub fn new(max_clients: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TableInner {
                connections: BTreeMap::new(),
                closed: false,
            })),
            next_id: Arc::new(AtomicU64::new(1)),
            max_clients,
        }
    }

    /// Track an incoming request before it is upgraded
    pub async fn register(&self, peer: SocketAddr) -> RegistryResult<ConnectionHandle> {
        let mut inner = self.inner.write().await;

        if inner.closed {
            return Err(RegistryError::Closed);
        }
        if inner.connections.len() >= self.max_clients {
            tracing::warn!(
                "Connection limit reached: {}/{}",
                inner.connections.len(),
                self.max_clients
            );
            return Err(RegistryError::Full {
                max: self.max_clients,
            });
        }

        let handle = ConnectionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        inner.connections.insert(
            handle,
            Connection {
                peer,
                kind: ConnectionKind::Http,
                outbound: None,
                connected_at: Utc::now(),
            },
        );
        tracing::info!(
            "Registered connection {} from {} ({} total)",
            handle,
            peer,
            inner.connections.len()
        );

        Ok(handle)
    }

    /// Mark a connection as upgraded and attach its outbound queue.
    /// Returns false if the connection is gone.
    pub async fn promote(&self, handle: ConnectionHandle, outbound: mpsc::Sender<Frame>) -> bool {
        let mut inner = self.inner.write().await;
        match inner.connections.get_mut(&handle) {
            Some(conn) => {
                conn.kind = ConnectionKind::WebSocket;
                conn.outbound = Some(outbound);
                true
            }
            None => false,
        }
    }

    pub async fn unregister(&self, handle: ConnectionHandle) {
        let mut inner = self.inner.write().await;
        if inner.connections.remove(&handle).is_some() {
            tracing::info!(
                "Unregistered connection {} ({} total remaining)",
                handle,
                inner.connections.len()
            );
        }
    }

    /// Refuse further registrations and queries, and drop every outbound
    /// queue so the writer tasks wind down
    pub async fn close(&self) {
        let mut inner = self.inner.write().await;
        inner.closed = true;
        let dropped = inner.connections.len();
        inner.connections.clear();
        tracing::info!("Connection table closed ({} connections dropped)", dropped);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn list(&self) -> Vec<ConnectionInfo> {
        self.inner
            .read()
            .await
            .connections
            .iter()
            .map(|(handle, conn)| ConnectionInfo {
                handle: *handle,
                peer: conn.peer,
                kind: conn.kind,
                connected_at: conn.connected_at,
            })
            .collect()
    }

    async fn outbound(&self, handle: ConnectionHandle) -> Option<mpsc::Sender<Frame>> {
        self.inner
            .read()
            .await
            .connections
            .get(&handle)
            .and_then(|conn| conn.outbound.clone())
    }
}

#[async_trait]
impl ConnectionRegistry for ConnectionTable {
    async fn query_clients(&self, max_count: usize) -> RegistryResult<Vec<ClientEntry>> {
        let inner = self.inner.read().await;
        if inner.closed {
            return Err(RegistryError::Closed);
        }

        Ok(inner
            .connections
            .iter()
            .take(max_count)
            .map(|(handle, conn)| ClientEntry::new(*handle, conn.kind))
            .collect())
    }

    async fn validate_handle(&self, handle: ConnectionHandle) -> bool {
        let inner = self.inner.read().await;
        matches!(
            inner.connections.get(&handle),
            Some(Connection {
                outbound: Some(tx),
                ..
            }) if !tx.is_closed()
        )
    }

    async fn resolve_originator(&self, trigger: &TriggerContext) -> Option<ConnectionHandle> {
        self.inner
            .read()
            .await
            .connections
            .iter()
            .find(|(_, conn)| conn.peer == trigger.peer)
            .map(|(handle, _)| *handle)
    }
}

/// Shared transport that hands frames to per-connection writer tasks
#[derive(Clone)]
pub struct ChannelTransport {
    table: ConnectionTable,
}

impl ChannelTransport {
    pub fn new(table: ConnectionTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send_frame(&self, recipient: ConnectionHandle, frame: &Frame) -> SendResult<()> {
        let outbound = self
            .table
            .outbound(recipient)
            .await
            .ok_or(SendError::Closed(recipient))?;

        // Blocks while the queue is full; the caller bounds the wait
        outbound
            .send(frame.clone())
            .await
            .map_err(|_| SendError::Closed(recipient))
    }
}
