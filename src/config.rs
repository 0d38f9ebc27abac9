//! Runtime configuration loaded from environment variables
//!
//! Every setting has a default, so an empty environment yields a working
//! server bound to 0.0.0.0:8080 that accepts up to 10 WebSocket clients.

use std::net::SocketAddr;
use std::time::Duration;

/// Hard cap on simultaneous WebSocket clients
pub const DEFAULT_MAX_CLIENTS: usize = 10;
/// How long a broadcast waits for the write lock before giving up
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(1000);
/// Upper bound for a single recipient send
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(1000);
/// Frames buffered per connection before sends start to block
pub const DEFAULT_OUTBOUND_QUEUE: usize = 32;

/// Settings for the broadcast core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Maximum number of recipients considered per broadcast
    pub max_clients: usize,
    /// Bounded wait for the write serializer
    pub lock_timeout: Duration,
    /// Bounded wait for each individual send
    pub send_timeout: Duration,
    /// Yield to the runtime after every send
    pub yield_between_sends: bool,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            yield_between_sends: true,
        }
    }
}

impl BroadcastConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_clients = env_parse("FANOUT_MAX_CLIENTS").unwrap_or(defaults.max_clients);
        let lock_timeout = env_parse("FANOUT_LOCK_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.lock_timeout);
        let send_timeout = env_parse("FANOUT_SEND_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.send_timeout);
        let yield_between_sends = env_flag("FANOUT_YIELD_BETWEEN_SENDS")
            .unwrap_or(defaults.yield_between_sends);

        tracing::info!(
            max_clients,
            lock_timeout_ms = lock_timeout.as_millis() as u64,
            send_timeout_ms = send_timeout.as_millis() as u64,
            yield_between_sends,
            "Broadcast config loaded"
        );

        Self {
            max_clients,
            lock_timeout,
            send_timeout,
            yield_between_sends,
        }
    }
}

/// Settings for the bundled HTTP/WebSocket server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Capacity of each connection's outbound queue
    pub outbound_queue: usize,
    /// Period of the server-time announcement (None = disabled)
    pub announce_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            announce_interval: None,
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = match std::env::var("FANOUT_BIND_ADDR") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
                tracing::warn!(
                    "Invalid FANOUT_BIND_ADDR {:?}: {}. Using {}",
                    raw,
                    e,
                    defaults.bind_addr
                );
                defaults.bind_addr
            }),
            Err(_) => defaults.bind_addr,
        };

        let outbound_queue = env_parse::<usize>("FANOUT_OUTBOUND_QUEUE")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.outbound_queue);

        // 0 disables the announcer
        let announce_interval = env_parse::<u64>("FANOUT_ANNOUNCE_INTERVAL_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        tracing::info!(
            %bind_addr,
            outbound_queue,
            announce_interval_secs = announce_interval.map(|d| d.as_secs()),
            "Server config loaded"
        );

        Self {
            bind_addr,
            outbound_queue,
            announce_interval,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v != "0" && v.to_lowercase() != "false")
}
