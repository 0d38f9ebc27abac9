use crate::state::AppState;
use crate::types::Frame;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Build the periodic announcement pushed to all clients
pub fn announcement(seq: u64) -> Frame {
    Frame::text(format!(
        "server time {} (announcement #{})",
        chrono::Utc::now().to_rfc3339(),
        seq
    ))
}

/// Spawn a background task that periodically broadcasts the server time to
/// every connected client
pub fn spawn_announcer(state: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut seq = 0u64;

        loop {
            tokio::time::sleep(interval).await;

            // Skip the round entirely when nobody is listening
            if state.connections.is_empty().await {
                continue;
            }

            seq += 1;
            let result = state.broadcaster.broadcast(&announcement(seq), None).await;
            tracing::debug!(
                seq,
                attempted = result.attempted,
                delivered = result.delivered,
                "Announcement sent"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announcement_contains_sequence() {
        match announcement(42) {
            Frame::Text(text) => {
                assert!(text.starts_with("server time "));
                assert!(text.ends_with("(announcement #42)"));
            }
            other => panic!("Expected text frame, got {:?}", other),
        }
    }
}
