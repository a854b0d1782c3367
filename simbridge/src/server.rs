//! Single-client WebSocket server
//!
//! The server binds its listening socket on construction, serves upgrade
//! requests once started, and keeps at most one live connection. Outbound
//! payloads are handed to short-lived tasks so callers never wait on the
//! network.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::websocket::handshake;
use crate::websocket::{ConnectionSlot, EventHandlers, FrameKind, WebSocketConfig};

/// Server instance
///
/// `Server` is a cheap handle; clones control the same listener, connection
/// slot and callbacks, so one task may block in [`Server::start`] while
/// another calls [`Server::stop`].
#[derive(Clone, Debug)]
pub struct Server {
    shared: Arc<Shared>,
}

/// State shared by the server handle, the accept loop, sessions and sender tasks
#[derive(Debug)]
pub(crate) struct Shared {
    local_addr: SocketAddr,
    runtime: Handle,
    config: WebSocketConfig,
    listener: Mutex<Option<TcpListener>>,
    serve_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: Mutex<CancellationToken>,
    sessions: TaskTracker,
    running: AtomicBool,
    listening: AtomicBool,
    /// Incremented by every start; an accept loop only resets the state flags
    /// while its own run is still the current one
    generation: AtomicU64,
    pub(crate) slot: ConnectionSlot,
    pub(crate) events: EventHandlers,
}

impl Shared {
    pub(crate) fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.lock().clone()
    }

    pub(crate) fn track_session(&self) -> TaskTrackerToken {
        self.sessions.token()
    }

    async fn transmit(&self, payload: Bytes, kind: FrameKind) {
        let Some(connection) = self.slot.get() else {
            tracing::debug!(len = payload.len(), "No active WebSocket connection, dropping payload");
            return;
        };

        if let Err(err) = connection.send(payload, kind).await {
            tracing::warn!(connection_id = %connection.id(), error = %err, "Failed to send frame");
            self.events.error(&err.to_string());
        }
    }
}

impl Server {
    /// Bind `0.0.0.0:port` with default limits
    ///
    /// Port 0 asks the OS for a free port; see [`Server::local_addr`].
    pub async fn bind(port: u16) -> Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        Self::bind_addr(addr, WebSocketConfig::default()).await
    }

    /// Bind the address and apply the limits from the configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::bind_addr(config.service.bind_addr(), config.websocket.clone()).await
    }

    /// Bind an explicit address
    ///
    /// Must be called from within a tokio runtime; that runtime executes the
    /// accept loop and every send.
    pub async fn bind_addr(addr: SocketAddr, config: WebSocketConfig) -> Result<Self> {
        let listener = bind_listener(addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::debug!("Bound WebSocket listener on {}", local_addr);

        Ok(Self {
            shared: Arc::new(Shared {
                local_addr,
                runtime: Handle::current(),
                config,
                listener: Mutex::new(Some(listener)),
                serve_task: Mutex::new(None),
                shutdown: Mutex::new(CancellationToken::new()),
                sessions: TaskTracker::new(),
                running: AtomicBool::new(false),
                listening: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                slot: ConnectionSlot::new(),
                events: EventHandlers::new(),
            }),
        })
    }

    /// Address the listening socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    /// Start serving upgrade requests
    ///
    /// With `block_until_first_connection` the call returns only once a peer
    /// has connected or the server has been stopped.
    pub async fn start(&self, block_until_first_connection: bool) -> Result<()> {
        let shared = &self.shared;
        if shared.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // The accept loop of a previous run must release the socket first
        let previous = shared.serve_task.lock().take();
        if let Some(previous) = previous {
            join_accept_loop(previous).await;
        }

        let prebound = shared.listener.lock().take();
        let listener = match prebound {
            Some(listener) => listener,
            None => match bind_listener(shared.local_addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    shared.running.store(false, Ordering::SeqCst);
                    return Err(err);
                }
            },
        };

        let shutdown = CancellationToken::new();
        *shared.shutdown.lock() = shutdown.clone();
        shared.sessions.reopen();

        // A stop() that raced with this start must still win
        if !shared.running.load(Ordering::SeqCst) {
            shutdown.cancel();
        }

        let app = self.router();
        let task_shared = shared.clone();
        let signal = shutdown.clone();
        shared.listening.store(true, Ordering::SeqCst);
        let task = shared.runtime.spawn(async move {
            let served = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await;

            if let Err(err) = served {
                tracing::error!(error = %err, "WebSocket accept loop failed");
                task_shared.events.error(&err.to_string());
            }
            if task_shared.generation.load(Ordering::SeqCst) == generation {
                task_shared.listening.store(false, Ordering::SeqCst);
                task_shared.running.store(false, Ordering::SeqCst);
            }
            tracing::info!("WebSocket listener released");
        });
        *shared.serve_task.lock() = Some(task);

        tracing::info!("WebSocket server listening on {}", shared.local_addr);

        if block_until_first_connection {
            self.wait_for_first_connection(&shutdown).await;
        }

        Ok(())
    }

    async fn wait_for_first_connection(&self, shutdown: &CancellationToken) {
        let interval = self.shared.config.connect_poll_interval();
        tracing::info!("Waiting for first WebSocket connection");

        while self.is_running() && !self.is_connected() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        if self.is_connected() {
            tracing::info!("First WebSocket connection established");
        } else {
            tracing::info!("Stopped before any WebSocket connection arrived");
        }
    }

    /// Signal the server to stop
    ///
    /// Safe to call from any thread and more than once. The accept loop and
    /// any active receive loop wind down in the background; use
    /// [`Server::shutdown`] to wait for that.
    pub fn stop(&self) {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        self.shared.shutdown.lock().cancel();
        self.shared.sessions.close();
        if was_running {
            tracing::info!("Stopping WebSocket server");
        }
    }

    /// Stop the server and wait until the listening socket is released and
    /// every receive loop has exited
    pub async fn shutdown(&self) {
        self.stop();

        let task = self.shared.serve_task.lock().take();
        if let Some(task) = task {
            join_accept_loop(task).await;
        }
        self.shared.sessions.wait().await;

        tracing::info!("WebSocket server shutdown complete");
    }

    /// Whether the server has been started and not stopped
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Whether the accept loop currently owns the listening socket
    pub fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::SeqCst)
    }

    /// Whether a peer currently occupies the connection slot
    pub fn is_connected(&self) -> bool {
        self.shared.slot.is_active()
    }

    /// Send a binary frame to the current peer
    ///
    /// Returns immediately. Without a connected peer the payload is dropped;
    /// write failures are reported through the error callback.
    pub fn send(&self, payload: impl Into<Bytes>) {
        self.send_frame(payload, FrameKind::Binary);
    }

    /// Send the UTF-8 bytes of `text` as a binary frame
    pub fn send_text(&self, text: impl Into<String>) {
        let text: String = text.into();
        self.send(text);
    }

    /// Send a frame of the given kind to the current peer
    pub fn send_frame(&self, payload: impl Into<Bytes>, kind: FrameKind) {
        let payload = payload.into();
        let shared = self.shared.clone();
        self.shared
            .runtime
            .spawn(async move { shared.transmit(payload, kind).await });
    }

    /// Register the handler invoked after a peer connects
    pub fn on_connected(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.shared.events.set_on_connected(callback);
    }

    /// Register the handler invoked after the current peer disconnects
    pub fn on_disconnected(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.shared.events.set_on_disconnected(callback);
    }

    /// Register the handler invoked for every non-empty inbound data frame
    pub fn on_message(&self, callback: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.shared.events.set_on_message(callback);
    }

    /// Register the handler invoked with a description of each failure
    pub fn on_error(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.shared.events.set_on_error(callback);
    }

    /// Router answering every path with the upgrade handler
    pub(crate) fn router(&self) -> Router {
        Router::new()
            .fallback(handshake::upgrade)
            .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new()))
            .with_state(self.shared.clone())
    }
}

async fn join_accept_loop(task: JoinHandle<()>) {
    if let Err(err) = task.await {
        tracing::warn!(error = %err, "WebSocket accept loop ended abnormally");
    }
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })
}
