use std::sync::Arc;

use crate::broadcast::{ConnectionRegistry, LivenessFilter};
use crate::types::{ConnectionHandle, ConnectionKind};

/// Takes point-in-time snapshots of the eligible recipients
#[derive(Clone)]
pub struct ClientEnumerator {
    registry: Arc<dyn ConnectionRegistry>,
}

impl ClientEnumerator {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Upgraded, live connections in registry order, at most `max_count`.
    ///
    /// A failed registry query yields an empty snapshot.
    pub async fn enumerate(&self, max_count: usize) -> Vec<ConnectionHandle> {
        let entries = match self.registry.query_clients(max_count).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to get client list: {}", e);
                return Vec::new();
            }
        };

        let liveness = LivenessFilter::new(self.registry.as_ref());
        let mut handles = Vec::with_capacity(entries.len().min(max_count));

        for entry in entries.into_iter().take(max_count) {
            if entry.kind != ConnectionKind::WebSocket {
                continue;
            }
            if liveness.is_valid(entry.handle).await {
                handles.push(entry.handle);
            }
        }

        handles
    }
}
