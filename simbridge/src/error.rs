//! Error types for the bridge
//!
//! Only start-up failures (configuration, binding the listening socket) are
//! returned to callers. Failures that belong to one connection are reported
//! through the registered callbacks, see [`crate::websocket::TransportError`]
//! and [`crate::websocket::HandshakeError`].

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias using the bridge error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bridge
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// The listening socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address the server tried to bind
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `start` was called while the accept loop is already running
    #[error("Server is already running")]
    AlreadyRunning,

    /// A sample could not be encoded for the wire
    #[error("Encoding error: {0}")]
    Encode(String),

    /// The sample source failed to produce a record
    #[error("Sample error: {0}")]
    Sample(String),

    /// An inbound payload is not a recognised command
    #[error("Invalid command: {0}")]
    Command(String),
}

impl Error {
    /// Whether the error prevents the server from running at all
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Bind { .. } | Error::Io(_))
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_mentions_address() {
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let err = Error::Bind {
            addr,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:9001"));
        assert!(msg.contains("address in use"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_recoverable_errors_are_not_fatal() {
        assert!(!Error::AlreadyRunning.is_fatal());
        assert!(!Error::Command("bad".into()).is_fatal());
        assert!(!Error::Sample("empty".into()).is_fatal());
    }

    #[test]
    fn test_json_error_converts_to_encode() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Encode(_)));
    }
}
