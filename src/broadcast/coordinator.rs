use std::sync::Arc;

use crate::broadcast::{
    BroadcastError, ClientEnumerator, ConnectionRegistry, Transport, WriteSerializer,
};
use crate::config::BroadcastConfig;
use crate::types::{BroadcastResult, ConnectionHandle, Frame, TriggerContext};

/// Orchestrates broadcasts over an injected registry and transport.
///
/// One instance per server; clone the surrounding `Arc` to share it between
/// connection handlers and background tasks.
pub struct Broadcaster {
    registry: Arc<dyn ConnectionRegistry>,
    enumerator: ClientEnumerator,
    serializer: WriteSerializer,
    config: BroadcastConfig,
}

impl Broadcaster {
    /// Take ownership of the shared transport and build the write serializer.
    ///
    /// Calling this again produces an independent instance; whoever holds the
    /// old one keeps its own lock.
    pub fn init(
        registry: Arc<dyn ConnectionRegistry>,
        transport: Arc<dyn Transport>,
        config: BroadcastConfig,
    ) -> Result<Self, BroadcastError> {
        if config.max_clients == 0 {
            return Err(BroadcastError::InvalidConfig(
                "max_clients must be at least 1".to_string(),
            ));
        }
        if config.lock_timeout.is_zero() || config.send_timeout.is_zero() {
            return Err(BroadcastError::InvalidConfig(
                "lock and send timeouts must be non-zero".to_string(),
            ));
        }

        tracing::info!(
            max_clients = config.max_clients,
            "Broadcaster initialized"
        );

        Ok(Self {
            enumerator: ClientEnumerator::new(Arc::clone(&registry)),
            serializer: WriteSerializer::new(transport, config.lock_timeout, config.send_timeout),
            registry,
            config,
        })
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// The gate every send on the shared transport goes through
    pub fn write_serializer(&self) -> &WriteSerializer {
        &self.serializer
    }

    /// Broadcast a text message, skipping the connection behind `trigger`.
    ///
    /// Returns the number of clients that received it.
    pub async fn broadcast_text(&self, trigger: Option<&TriggerContext>, text: &str) -> usize {
        let originator = match trigger {
            Some(trigger) => self.registry.resolve_originator(trigger).await,
            None => None,
        };

        self.broadcast(&Frame::text(text), originator).await.delivered
    }

    /// Like [`Broadcaster::try_broadcast`] but failures are logged and turn
    /// into a zero result.
    pub async fn broadcast(
        &self,
        frame: &Frame,
        originator: Option<ConnectionHandle>,
    ) -> BroadcastResult {
        match self.try_broadcast(frame, originator).await {
            Ok(result) => result,
            Err(BroadcastError::EmptyMessage) => {
                tracing::error!("Broadcast rejected: message is empty");
                BroadcastResult::default()
            }
            Err(e) => {
                tracing::warn!("Broadcast abandoned: {}", e);
                BroadcastResult::default()
            }
        }
    }

    /// Send `frame` to every live client except `originator`.
    ///
    /// Only an empty frame or a write-lock timeout fails the whole call;
    /// individual send failures are counted and skipped.
    pub async fn try_broadcast(
        &self,
        frame: &Frame,
        originator: Option<ConnectionHandle>,
    ) -> Result<BroadcastResult, BroadcastError> {
        if frame.is_empty() {
            return Err(BroadcastError::EmptyMessage);
        }

        let recipients: Vec<ConnectionHandle> = self
            .enumerator
            .enumerate(self.config.max_clients)
            .await
            .into_iter()
            .filter(|handle| Some(*handle) != originator)
            .collect();

        if recipients.is_empty() {
            tracing::debug!("No recipients for broadcast");
            return Ok(BroadcastResult::default());
        }

        let guard = self.serializer.acquire().await?;
        let mut result = BroadcastResult {
            attempted: recipients.len(),
            delivered: 0,
        };

        for handle in recipients {
            match guard.send(handle, frame).await {
                Ok(()) => {
                    tracing::debug!("Sent {} bytes to {}", frame.len(), handle);
                    result.delivered += 1;
                }
                Err(e) => tracing::warn!("Failed to send frame to {}: {}", handle, e),
            }

            if self.config.yield_between_sends {
                tokio::task::yield_now().await;
            }
        }
        drop(guard);

        tracing::debug!(
            attempted = result.attempted,
            delivered = result.delivered,
            "Broadcast complete"
        );

        Ok(result)
    }

    /// Single server-driven send, serialized with broadcasts
    pub async fn send_to(&self, handle: ConnectionHandle, frame: &Frame) -> Result<(), BroadcastError> {
        if frame.is_empty() {
            return Err(BroadcastError::EmptyMessage);
        }

        let guard = self.serializer.acquire().await?;
        guard.send(handle, frame).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{RegistryResult, SendError, SendResult};
    use crate::types::{ClientEntry, ConnectionKind};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StaticRegistry(Vec<ConnectionHandle>);

    #[async_trait]
    impl ConnectionRegistry for StaticRegistry {
        async fn query_clients(&self, max_count: usize) -> RegistryResult<Vec<ClientEntry>> {
            Ok(self
                .0
                .iter()
                .take(max_count)
                .map(|h| ClientEntry::new(*h, ConnectionKind::WebSocket))
                .collect())
        }

        async fn validate_handle(&self, _handle: ConnectionHandle) -> bool {
            true
        }

        async fn resolve_originator(&self, _trigger: &TriggerContext) -> Option<ConnectionHandle> {
            self.0.first().copied()
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<ConnectionHandle>>,
        failing: Vec<ConnectionHandle>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_frame(&self, recipient: ConnectionHandle, _frame: &Frame) -> SendResult<()> {
            self.sent.lock().unwrap().push(recipient);
            if self.failing.contains(&recipient) {
                Err(SendError::Closed(recipient))
            } else {
                Ok(())
            }
        }
    }

    fn handles(n: u64) -> Vec<ConnectionHandle> {
        (1..=n).map(ConnectionHandle).collect()
    }

    #[test]
    fn test_init_rejects_zero_clients() {
        let config = BroadcastConfig {
            max_clients: 0,
            ..BroadcastConfig::default()
        };
        let result = Broadcaster::init(
            Arc::new(StaticRegistry(vec![])),
            Arc::new(RecordingTransport::default()),
            config,
        );
        assert!(matches!(result, Err(BroadcastError::InvalidConfig(_))));
    }

    #[test]
    fn test_init_rejects_zero_timeout() {
        let config = BroadcastConfig {
            lock_timeout: Duration::ZERO,
            ..BroadcastConfig::default()
        };
        let result = Broadcaster::init(
            Arc::new(StaticRegistry(vec![])),
            Arc::new(RecordingTransport::default()),
            config,
        );
        assert!(matches!(result, Err(BroadcastError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_reinit_replaces_serializer_state() {
        let registry: Arc<dyn ConnectionRegistry> = Arc::new(StaticRegistry(handles(2)));
        let transport = Arc::new(RecordingTransport::default());
        let config = BroadcastConfig {
            lock_timeout: Duration::from_millis(50),
            ..BroadcastConfig::default()
        };

        let first = Broadcaster::init(registry.clone(), transport.clone(), config.clone()).unwrap();
        let _held = first.write_serializer().acquire().await.unwrap();

        let second = Broadcaster::init(
            registry,
            transport.clone(),
            BroadcastConfig {
                max_clients: 1,
                ..config
            },
        )
        .unwrap();

        assert_eq!(second.config().max_clients, 1);
        assert_eq!(second.broadcast(&Frame::text("x"), None).await.delivered, 1);
        assert_eq!(first.broadcast(&Frame::text("x"), None).await.delivered, 0);
    }

    #[tokio::test]
    async fn test_broadcast_text_skips_originator() {
        let transport = Arc::new(RecordingTransport::default());
        let broadcaster = Broadcaster::init(
            Arc::new(StaticRegistry(handles(3))),
            transport.clone(),
            BroadcastConfig::default(),
        )
        .unwrap();

        let trigger = TriggerContext::new(([127, 0, 0, 1], 4000).into());
        let delivered = broadcaster.broadcast_text(Some(&trigger), "hello").await;

        assert_eq!(delivered, 2);
        assert_eq!(
            *transport.sent.lock().unwrap(),
            vec![ConnectionHandle(2), ConnectionHandle(3)]
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_loop() {
        let transport = Arc::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
            failing: vec![ConnectionHandle(2)],
        });
        let broadcaster = Broadcaster::init(
            Arc::new(StaticRegistry(handles(4))),
            transport.clone(),
            BroadcastConfig::default(),
        )
        .unwrap();

        let result = broadcaster.broadcast(&Frame::text("x"), None).await;
        assert_eq!(result.attempted, 4);
        assert_eq!(result.delivered, 3);
        assert_eq!(transport.sent.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_send_to_rejects_empty_frame() {
        let broadcaster = Broadcaster::init(
            Arc::new(StaticRegistry(handles(1))),
            Arc::new(RecordingTransport::default()),
            BroadcastConfig::default(),
        )
        .unwrap();

        let result = broadcaster.send_to(ConnectionHandle(1), &Frame::text("")).await;
        assert!(matches!(result, Err(BroadcastError::EmptyMessage)));
        assert!(broadcaster
            .send_to(ConnectionHandle(1), &Frame::text("welcome"))
            .await
            .is_ok());
    }
}
