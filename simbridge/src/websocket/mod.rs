//! Single-client WebSocket plumbing
//!
//! This module holds the pieces the [`Server`](crate::server::Server) is built
//! from: the frame transport over an upgraded socket, the connection slot that
//! tracks the one live peer, the handshake handler, the per-connection receive
//! loop and the callback dispatcher.
//!
//! ## Connection model
//!
//! - **One peer at a time**: the most recent successful handshake owns the slot
//! - **Callbacks, not requests**: lifecycle and inbound data surface through
//!   `on_connected`, `on_disconnected`, `on_message` and `on_error`
//! - **Fire-and-forget sends**: outbound frames are written by short-lived tasks
//!
//! ## Example
//!
//! ```rust,ignore
//! use simbridge::prelude::*;
//!
//! let server = Server::bind(9002).await?;
//! server.on_message(|payload| tracing::info!(len = payload.len(), "received"));
//! server.start(false).await?;
//! server.send_text("hello");
//! ```

mod config;
mod events;
mod frame;
mod handler;
pub(crate) mod handshake;
mod session;
mod slot;
mod transport;

// Re-exports
pub use config::WebSocketConfig;
pub use events::{ConnectionCallback, ErrorCallback, EventHandlers, MessageCallback};
pub use frame::{Frame, FrameKind, Opcode, CLOSE_GOING_AWAY};
pub use handler::{Connection, ConnectionId};
pub use handshake::{HandshakeError, WEBSOCKET_VERSION};
pub use slot::ConnectionSlot;
pub use transport::{split, FrameReceiver, FrameSender, TransportError};

// Re-export axum WebSocket types for convenience
pub use axum::extract::ws::{Message, WebSocket};
