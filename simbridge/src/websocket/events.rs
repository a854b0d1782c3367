//! Lifecycle callbacks
//!
//! Each event kind has at most one handler. Registering again replaces the
//! previous handler, and an event with no handler is dropped. Handlers run
//! synchronously on the task that raised the event.

use parking_lot::RwLock;
use std::sync::Arc;

/// Handler for connect and disconnect events
pub type ConnectionCallback = Arc<dyn Fn() + Send + Sync>;

/// Handler for inbound payloads
pub type MessageCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Handler for error descriptions
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Registered callbacks for one server
#[derive(Default)]
pub struct EventHandlers {
    on_connected: RwLock<Option<ConnectionCallback>>,
    on_disconnected: RwLock<Option<ConnectionCallback>>,
    on_message: RwLock<Option<MessageCallback>>,
    on_error: RwLock<Option<ErrorCallback>>,
}

impl EventHandlers {
    /// Create a dispatcher with no handlers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the connected handler
    pub fn set_on_connected(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.on_connected.write() = Some(Arc::new(callback));
    }

    /// Replace the disconnected handler
    pub fn set_on_disconnected(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.on_disconnected.write() = Some(Arc::new(callback));
    }

    /// Replace the message handler
    pub fn set_on_message(&self, callback: impl Fn(&[u8]) + Send + Sync + 'static) {
        *self.on_message.write() = Some(Arc::new(callback));
    }

    /// Replace the error handler
    pub fn set_on_error(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_error.write() = Some(Arc::new(callback));
    }

    // The handler is cloned out of its lock before it runs, so a handler may
    // itself register new handlers.

    pub(crate) fn connected(&self) {
        let handler = self.on_connected.read().clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    pub(crate) fn disconnected(&self) {
        let handler = self.on_disconnected.read().clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    pub(crate) fn message(&self, payload: &[u8]) {
        let handler = self.on_message.read().clone();
        if let Some(handler) = handler {
            handler(payload);
        }
    }

    pub(crate) fn error(&self, description: &str) {
        let handler = self.on_error.read().clone();
        match handler {
            Some(handler) => handler(description),
            None => tracing::debug!(error = %description, "No error handler registered"),
        }
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connected", &self.on_connected.read().is_some())
            .field("on_disconnected", &self.on_disconnected.read().is_some())
            .field("on_message", &self.on_message.read().is_some())
            .field("on_error", &self.on_error.read().is_some())
            .finish()
    }
}
