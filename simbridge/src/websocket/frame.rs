//! Frame model shared by the transport and the receive loop

use std::fmt;

use axum::body::Bytes;
use axum::extract::ws::Message;

/// Close code sent when the server stops while a peer is attached
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// WebSocket frame opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// UTF-8 text frame
    Text,
    /// Binary frame
    Binary,
    /// Close frame
    Close,
    /// Ping control frame
    Ping,
    /// Pong control frame
    Pong,
}

impl Opcode {
    /// Whether frames with this opcode carry application data
    #[must_use]
    pub fn is_data(self) -> bool {
        matches!(self, Opcode::Text | Opcode::Binary)
    }

    /// Whether this is a control opcode
    #[must_use]
    pub fn is_control(self) -> bool {
        !self.is_data()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Binary => write!(f, "binary"),
            Self::Close => write!(f, "close"),
            Self::Ping => write!(f, "ping"),
            Self::Pong => write!(f, "pong"),
        }
    }
}

/// Kind of data frame the server sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameKind {
    /// Binary frame (default for all outbound payloads)
    #[default]
    Binary,
    /// Text frame; the payload must be valid UTF-8
    Text,
}

/// A single received frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    opcode: Opcode,
    payload: Bytes,
}

impl Frame {
    /// Create a frame from its parts
    #[must_use]
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Frame opcode
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Frame payload
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the frame and return its payload
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Payload length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Whether the peer asked to close the connection
    #[must_use]
    pub fn is_close(&self) -> bool {
        self.opcode == Opcode::Close
    }

    /// Status code carried by a close frame, if any
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        if self.opcode != Opcode::Close || self.payload.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::new(
                Opcode::Text,
                Bytes::copy_from_slice(text.as_str().as_bytes()),
            ),
            Message::Binary(data) => Frame::new(Opcode::Binary, data),
            Message::Ping(data) => Frame::new(Opcode::Ping, data),
            Message::Pong(data) => Frame::new(Opcode::Pong, data),
            Message::Close(None) => Frame::new(Opcode::Close, Bytes::new()),
            Message::Close(Some(close)) => {
                // Wire layout: big-endian status code followed by the UTF-8 reason
                let reason = close.reason.as_str().as_bytes();
                let mut payload = Vec::with_capacity(2 + reason.len());
                payload.extend_from_slice(&close.code.to_be_bytes());
                payload.extend_from_slice(reason);
                Frame::new(Opcode::Close, payload)
            }
        }
    }
}
