use crate::broadcast::ConnectionRegistry;
use crate::types::ConnectionHandle;

/// Decides whether a candidate handle is still usable for a write
pub struct LivenessFilter<'a> {
    registry: &'a dyn ConnectionRegistry,
}

impl<'a> LivenessFilter<'a> {
    pub fn new(registry: &'a dyn ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Probe only; an invalid handle is excluded, never reported as an error
    pub async fn is_valid(&self, handle: ConnectionHandle) -> bool {
        let valid = self.registry.validate_handle(handle).await;
        if !valid {
            tracing::debug!("Skipping stale connection {}", handle);
        }
        valid
    }
}
