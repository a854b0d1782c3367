//! # simbridge
//!
//! Single-client WebSocket bridge between a running simulation and one
//! remote peer.
//!
//! ## Features
//!
//! - **One peer at a time**: the most recent successful handshake owns the connection
//! - **Fire-and-forget sends**: [`Server::send`](server::Server::send) never blocks the caller
//! - **Callbacks**: connected, disconnected, message and error handlers
//! - **Telemetry publishing**: periodic position samples pushed to the peer
//! - **Graceful shutdown**: the peer receives a Close frame and the port is released
//!
//! ## Example
//!
//! ```rust,no_run
//! use simbridge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     let server = Server::from_config(&config).await?;
//!     server.on_message(|payload| {
//!         tracing::info!(len = payload.len(), "Received payload");
//!     });
//!
//!     // Wait for the first peer, then greet it
//!     server.start(true).await?;
//!     server.send_text("hello");
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod server;
pub mod telemetry;
pub mod websocket;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, PublisherConfig, ServiceConfig};
    pub use crate::error::{Error, Result};
    pub use crate::observability::{init_tracing, init_tracing_pretty};
    pub use crate::server::Server;

    pub use crate::telemetry::{
        ChannelState, Command, Encoder, JsonEncoder, Position, PositionRecord, Publisher,
        PublisherStats, SampleSource, StaticSource,
    };

    pub use crate::websocket::{
        ConnectionId, FrameKind, HandshakeError, TransportError, WebSocketConfig,
    };
}
