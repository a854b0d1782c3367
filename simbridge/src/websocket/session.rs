//! Receive loop for an upgraded connection
//!
//! A session installs its connection into the slot, forwards inbound data
//! frames to the message callback and, when the loop ends, clears the slot and
//! reports the disconnect. Only the connection that still occupies the slot
//! reports a disconnect; a connection displaced by a newer handshake ends
//! quietly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use tokio_util::sync::CancellationToken;

use super::frame::{Opcode, CLOSE_GOING_AWAY};
use super::handler::Connection;
use super::transport::{self, FrameReceiver, TransportError};
use crate::server::Shared;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a receive loop ended
#[derive(Debug)]
enum Exit {
    /// The peer sent a close frame
    PeerClosed(Option<u16>),
    /// The stream ended without a close frame
    Dropped,
    /// The server is stopping
    Shutdown,
    /// Receiving failed
    Failed(TransportError),
}

pub(crate) async fn run(shared: Arc<Shared>, socket: WebSocket, peer: Option<SocketAddr>) {
    let _tracked = shared.track_session();
    let shutdown = shared.shutdown_token();

    let (sender, mut receiver) = transport::split(socket);
    let connection = Arc::new(Connection::new(sender, peer));
    let connection_id = connection.id();

    if let Some(previous) = shared.slot.set(connection.clone()) {
        tracing::info!(
            connection_id = %connection_id,
            superseded = %previous.id(),
            "New connection replaces the active one"
        );
    }
    tracing::info!(connection_id = %connection_id, peer = ?peer, "WebSocket connection established");
    shared.events.connected();

    let exit = receive_loop(&shared, &connection, &mut receiver, &shutdown).await;

    match &exit {
        Exit::PeerClosed(code) => {
            tracing::info!(connection_id = %connection_id, code = ?code, "Peer requested close");
        }
        Exit::Dropped => {
            tracing::info!(connection_id = %connection_id, "Peer disconnected without a close frame");
        }
        Exit::Shutdown => {
            let closing = connection.close(CLOSE_GOING_AWAY, "server shutting down");
            match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::debug!(connection_id = %connection_id, error = %err, "Close frame not delivered");
                }
                Err(_) => {
                    tracing::debug!(connection_id = %connection_id, "Timed out sending close frame");
                }
            }
        }
        Exit::Failed(err) => {
            tracing::warn!(connection_id = %connection_id, error = %err, "WebSocket receive failed");
            shared.events.error(&err.to_string());
        }
    }

    if shared.slot.clear_if_current(&connection) {
        tracing::info!(
            connection_id = %connection_id,
            duration_ms = connection.age().as_millis() as u64,
            "WebSocket connection closed"
        );
        shared.events.disconnected();
    } else {
        tracing::debug!(connection_id = %connection_id, "Superseded connection ended");
    }
}

async fn receive_loop(
    shared: &Shared,
    connection: &Connection,
    receiver: &mut FrameReceiver,
    shutdown: &CancellationToken,
) -> Exit {
    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => return Exit::Shutdown,
            received = receiver.receive() => received,
        };

        let frame = match received {
            Ok(frame) => frame,
            Err(TransportError::Closed) => return Exit::Dropped,
            Err(err) => return Exit::Failed(err),
        };

        tracing::trace!(
            connection_id = %connection.id(),
            opcode = %frame.opcode(),
            len = frame.len(),
            "Frame received"
        );

        match frame.opcode() {
            Opcode::Close => return Exit::PeerClosed(frame.close_code()),
            Opcode::Text | Opcode::Binary if !frame.is_empty() => {
                shared.events.message(frame.payload());
            }
            // Pings are answered by the socket itself; empty data frames carry nothing
            _ => {}
        }
    }
}
