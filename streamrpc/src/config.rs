//! Server configuration - server-wide static settings.
//!
//! Set once when the server is built and shared by every call.

use std::time::Duration;

use streamrpc_core::{DEFAULT_CHANNEL_CAPACITY, MessageLimits};

/// Server-wide configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Frames buffered per direction of a call before `send()` waits.
    pub channel_capacity: usize,
    /// Upper bound on how long any call may run.
    pub server_timeout: Option<Duration>,
    /// Message size limits, applied in both directions.
    pub limits: MessageLimits,
    /// Authenticate every call through the configured security provider.
    pub transport_security: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            server_timeout: None,
            limits: MessageLimits::default(),
            transport_security: false,
        }
    }
}
