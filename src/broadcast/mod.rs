//! Fan-out of one frame to every live WebSocket client
//!
//! The server owns the connection registry and the transport; this module
//! only borrows them through the [`ConnectionRegistry`] and [`Transport`]
//! traits. A broadcast snapshots the registry, drops stale entries, takes the
//! write lock around the shared transport and sends to each recipient in turn.

mod coordinator;
mod enumerator;
mod liveness;
mod serializer;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::{ClientEntry, ConnectionHandle, Frame, TriggerContext};

pub use coordinator::Broadcaster;
pub use enumerator::ClientEnumerator;
pub use liveness::LivenessFilter;
pub use serializer::{WriteGuard, WriteSerializer};

/// Errors from querying the connection registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("connection registry is closed")]
    Closed,

    #[error("connection limit reached ({max} clients)")]
    Full { max: usize },

    /// Transient failure inside the registry; broadcasts treat it as an
    /// empty client list
    #[error("registry query failed: {0}")]
    Query(String),
}

/// Errors from a single recipient send
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("connection {0} is closed")]
    Closed(ConnectionHandle),

    #[error("send to {handle} timed out after {timeout:?}")]
    Timeout {
        handle: ConnectionHandle,
        timeout: Duration,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Reasons a broadcast (or a serialized send) did not go through
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("refusing to send an empty message")]
    EmptyMessage,

    #[error("write lock not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Send(#[from] SendError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
pub type SendResult<T> = Result<T, SendError>;

/// Authoritative set of active connections, owned by the server
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Up to `max_count` connections in a stable iteration order
    async fn query_clients(&self, max_count: usize) -> RegistryResult<Vec<ClientEntry>>;

    /// Whether the handle still refers to an open, writable connection.
    /// Must not consume data from the connection.
    async fn validate_handle(&self, handle: ConnectionHandle) -> bool;

    /// Map the triggering request back to its connection
    async fn resolve_originator(&self, trigger: &TriggerContext) -> Option<ConnectionHandle>;
}

/// Server-wide send primitive. Not safe for concurrent use; callers go
/// through [`WriteSerializer`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_frame(&self, recipient: ConnectionHandle, frame: &Frame) -> SendResult<()>;
}
