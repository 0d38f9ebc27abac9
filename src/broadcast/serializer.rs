use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use crate::broadcast::{BroadcastError, SendError, SendResult, Transport};
use crate::types::{ConnectionHandle, Frame};

/// Mutual-exclusion gate around the shared transport.
///
/// The transport lives inside the mutex, so the only way to send is through
/// a [`WriteGuard`]. Dropping the guard releases the lock.
pub struct WriteSerializer {
    transport: Mutex<Arc<dyn Transport>>,
    lock_timeout: Duration,
    send_timeout: Duration,
}

impl WriteSerializer {
    pub fn new(transport: Arc<dyn Transport>, lock_timeout: Duration, send_timeout: Duration) -> Self {
        Self {
            transport: Mutex::new(transport),
            lock_timeout,
            send_timeout,
        }
    }

    /// Wait at most `lock_timeout` for exclusive access
    pub async fn acquire(&self) -> Result<WriteGuard<'_>, BroadcastError> {
        match tokio::time::timeout(self.lock_timeout, self.transport.lock()).await {
            Ok(transport) => Ok(WriteGuard {
                transport,
                send_timeout: self.send_timeout,
            }),
            Err(_) => Err(BroadcastError::LockTimeout(self.lock_timeout)),
        }
    }
}

/// Exclusive access to the transport for as long as it is held
pub struct WriteGuard<'a> {
    transport: MutexGuard<'a, Arc<dyn Transport>>,
    send_timeout: Duration,
}

impl WriteGuard<'_> {
    /// One send, bounded by the per-recipient timeout
    pub async fn send(&self, recipient: ConnectionHandle, frame: &Frame) -> SendResult<()> {
        match tokio::time::timeout(self.send_timeout, self.transport.send_frame(recipient, frame))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout {
                handle: recipient,
                timeout: self.send_timeout,
            }),
        }
    }
}
