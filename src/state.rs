use std::sync::Arc;

use crate::broadcast::{BroadcastError, Broadcaster};
use crate::config::{BroadcastConfig, ServerConfig};
use crate::ws::connections::{ChannelTransport, ConnectionTable};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub connections: ConnectionTable,
    pub broadcaster: Arc<Broadcaster>,
    pub server_config: ServerConfig,
}

impl AppState {
    /// Wire the connection table, the shared transport and the broadcaster
    /// together. Called once at startup.
    pub fn new(
        broadcast_config: BroadcastConfig,
        server_config: ServerConfig,
    ) -> Result<Self, BroadcastError> {
        let connections = ConnectionTable::new(broadcast_config.max_clients);
        let transport = ChannelTransport::new(connections.clone());
        let broadcaster = Broadcaster::init(
            Arc::new(connections.clone()),
            Arc::new(transport),
            broadcast_config,
        )?;

        Ok(Self {
            connections,
            broadcaster: Arc::new(broadcaster),
            server_config,
        })
    }
}
