//! WebSocket configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Maximum message size in bytes (default: 64KB)
    #[serde(default = "default_max_message_size")]
    pub max_message_size_bytes: usize,

    /// Maximum frame size in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size_bytes: usize,

    /// Poll period of the "block until first connection" start-up wait, in milliseconds
    #[serde(default = "default_connect_poll_interval")]
    pub connect_poll_interval_ms: u64,
}

impl WebSocketConfig {
    /// Get the start-up poll interval as a Duration
    #[must_use]
    pub fn connect_poll_interval(&self) -> Duration {
        Duration::from_millis(self.connect_poll_interval_ms.max(1))
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size_bytes: default_max_message_size(),
            max_frame_size_bytes: default_max_frame_size(),
            connect_poll_interval_ms: default_connect_poll_interval(),
        }
    }
}

// Default value functions

const fn default_max_message_size() -> usize {
    65536 // 64KB
}

const fn default_max_frame_size() -> usize {
    16384 // 16KB
}

const fn default_connect_poll_interval() -> u64 {
    1000
}
