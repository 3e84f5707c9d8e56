//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Port used when none is configured
pub const DEFAULT_PORT: u16 = 8080;

/// Default cap on a single WebSocket message
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Largest accepted WebSocket message
    pub max_message_size: usize,

    /// Largest accepted WebSocket frame
    pub max_frame_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// How long a closing connection may take to flush before it is dropped
    pub close_timeout: Duration,

    /// Interval between stats log lines (zero disables)
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_frame_size: DEFAULT_MAX_MESSAGE_SIZE,
            tcp_nodelay: true, // Handshakes are small and latency-sensitive
            close_timeout: Duration::from_secs(5),
            stats_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the message size limit; the frame limit never exceeds it
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self.max_frame_size = self.max_frame_size.min(size);
        self
    }

    /// Set close timeout
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set stats log interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Check that the limits are usable
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 {
            return Err(Error::Config("max_message_size must be non-zero".into()));
        }
        if self.max_frame_size == 0 || self.max_frame_size > self.max_message_size {
            return Err(Error::Config(format!(
                "max_frame_size must be in 1..={}",
                self.max_message_size
            )));
        }
        Ok(())
    }
}
