//! Frame transport over an upgraded WebSocket
//!
//! The upgraded socket is split into an outbound [`FrameSender`] and an
//! inbound [`FrameReceiver`]. The two directions are independent: the receive
//! loop owns the receiver while any number of senders share the outbound half,
//! whose writes are serialized so frames are never interleaved.

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::Mutex;

use super::frame::{Frame, FrameKind};

/// Failure of a single frame send or receive
#[derive(Debug, Error)]
pub enum TransportError {
    /// The stream ended without a close frame
    #[error("connection closed by peer without a close frame")]
    Closed,

    /// The underlying socket failed
    #[error("WebSocket transport error: {0}")]
    Socket(#[from] axum::Error),

    /// A text frame was requested for a payload that is not UTF-8
    #[error("text frame payload is not valid UTF-8")]
    InvalidUtf8,
}

impl TransportError {
    /// Whether this is the quiet end-of-stream rather than a failure
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

/// Split an upgraded socket into its outbound and inbound halves
pub fn split(socket: WebSocket) -> (FrameSender, FrameReceiver) {
    let (sink, stream) = socket.split();
    (
        FrameSender {
            sink: Mutex::new(sink),
        },
        FrameReceiver { stream },
    )
}

/// Outbound half of a connection
#[derive(Debug)]
pub struct FrameSender {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl FrameSender {
    /// Send one data frame
    ///
    /// Concurrent callers are serialized; each frame is written atomically.
    pub async fn send(&self, payload: Bytes, kind: FrameKind) -> Result<(), TransportError> {
        let message = match kind {
            FrameKind::Binary => Message::Binary(payload),
            FrameKind::Text => {
                let text =
                    String::from_utf8(payload.to_vec()).map_err(|_| TransportError::InvalidUtf8)?;
                Message::Text(text.into())
            }
        };

        let mut sink = self.sink.lock().await;
        sink.send(message).await?;
        Ok(())
    }

    /// Send a close frame with the given status code and reason
    pub async fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code,
            reason: reason.to_owned().into(),
        };
        let mut sink = self.sink.lock().await;
        sink.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}

/// Inbound half of a connection
#[derive(Debug)]
pub struct FrameReceiver {
    stream: SplitStream<WebSocket>,
}

impl FrameReceiver {
    /// Wait for the next frame
    ///
    /// A close frame is returned as a normal [`Frame`]; only a stream that ends
    /// without one yields [`TransportError::Closed`].
    pub async fn receive(&mut self) -> Result<Frame, TransportError> {
        match self.stream.next().await {
            Some(Ok(message)) => Ok(Frame::from(message)),
            Some(Err(err)) => Err(TransportError::Socket(err)),
            None => Err(TransportError::Closed),
        }
    }
}
