//! Connection handle shared between the receive loop and senders

use axum::body::Bytes;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;
use uuid::Uuid;

use super::frame::FrameKind;
use super::transport::{FrameSender, TransportError};

/// Unique identifier for a WebSocket connection
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new unique connection ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ConnectionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The live peer currently (or formerly) attached to the server
///
/// Handles are shared as `Arc<Connection>`. A handle stays usable after the
/// connection slot has moved on; writes then fail with a transport error.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    established_at: Instant,
    sender: FrameSender,
}

impl Connection {
    /// Wrap the outbound half of an upgraded socket
    #[must_use]
    pub fn new(sender: FrameSender, peer: Option<SocketAddr>) -> Self {
        Self {
            id: ConnectionId::new(),
            peer,
            established_at: Instant::now(),
            sender,
        }
    }

    /// Connection identifier
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address, when the listener reported one
    #[must_use]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Time since the handshake completed
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.established_at.elapsed()
    }

    /// Send a frame to this peer
    pub async fn send(&self, payload: Bytes, kind: FrameKind) -> Result<(), TransportError> {
        self.sender.send(payload, kind).await
    }

    /// Send a binary frame to this peer
    pub async fn send_binary(&self, payload: impl Into<Bytes>) -> Result<(), TransportError> {
        self.send(payload.into(), FrameKind::Binary).await
    }

    /// Ask the peer to close the connection
    pub async fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        self.sender.close(code, reason).await
    }
}
