//! The single "current connection" slot
//!
//! The slot holds at most one shared handle. The lock guards only the
//! installation, removal and cloning of that handle; callers perform frame I/O
//! on the cloned handle after the lock is released.

use parking_lot::Mutex;
use std::sync::Arc;

use super::handler::Connection;

/// Holder of the active connection
#[derive(Debug)]
pub struct ConnectionSlot<T = Connection> {
    current: Mutex<Option<Arc<T>>>,
}

impl<T> ConnectionSlot<T> {
    /// Create an empty slot
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Install a connection, returning the one it displaced
    pub fn set(&self, connection: Arc<T>) -> Option<Arc<T>> {
        self.current.lock().replace(connection)
    }

    /// Remove whatever connection is installed
    pub fn clear(&self) -> Option<Arc<T>> {
        self.current.lock().take()
    }

    /// Remove `connection` only if it is still the installed one
    ///
    /// Returns `true` when the slot was cleared.
    pub fn clear_if_current(&self, connection: &Arc<T>) -> bool {
        let mut current = self.current.lock();
        match current.as_ref() {
            Some(installed) if Arc::ptr_eq(installed, connection) => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    /// Clone the installed handle
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> {
        self.current.lock().clone()
    }

    /// Whether a connection is installed
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Whether `connection` is the installed one
    #[must_use]
    pub fn is_current(&self, connection: &Arc<T>) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|installed| Arc::ptr_eq(installed, connection))
    }
}

impl<T> Default for ConnectionSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
