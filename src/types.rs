use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for one client connection.
///
/// Only meaningful for the duration of a single broadcast pass; handles are
/// re-queried from the registry every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionHandle(pub u64);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How the server classifies a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Plain HTTP request (not yet, or never, upgraded)
    Http,
    /// Upgraded to the WebSocket protocol
    WebSocket,
}

/// One row returned by a registry query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientEntry {
    pub handle: ConnectionHandle,
    pub kind: ConnectionKind,
}

impl ClientEntry {
    pub fn new(handle: ConnectionHandle, kind: ConnectionKind) -> Self {
        Self { handle, kind }
    }
}

/// Outbound payload plus its type tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn text(text: impl Into<String>) -> Self {
        Frame::Text(text.into())
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Frame::Binary(data.into())
    }

    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastResult {
    /// Recipients a send was attempted for
    pub attempted: usize,
    /// Recipients that accepted the frame
    pub delivered: usize,
}

impl BroadcastResult {
    pub fn failed(&self) -> usize {
        self.attempted - self.delivered
    }
}

/// The inbound request that triggered a broadcast, if any.
///
/// The registry maps it back to a connection handle so the originator can be
/// skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerContext {
    pub peer: SocketAddr,
}

impl TriggerContext {
    pub fn new(peer: SocketAddr) -> Self {
        Self { peer }
    }
}
