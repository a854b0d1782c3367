//! Upgrade handshake handling
//!
//! Every inbound HTTP request is treated as an upgrade attempt. A request that
//! fails the WebSocket handshake is answered with `400 Bad Request` and reported
//! through the error callback; it never touches the connection slot.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{ConnectInfo, FromRequestParts, Request, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use http::header::SEC_WEBSOCKET_VERSION;
use http::{HeaderMap, HeaderValue, StatusCode};
use thiserror::Error;

use super::session;
use crate::server::Shared;

/// The only protocol version the server speaks
pub const WEBSOCKET_VERSION: &str = "13";

/// Reason an upgrade attempt was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// The request is not a WebSocket upgrade request at all
    #[error("request is not a WebSocket handshake: {0}")]
    NotWebSocket(String),

    /// `Sec-WebSocket-Key` header missing
    #[error("WebSocket handshake missing Sec-WebSocket-Key header")]
    MissingKey,

    /// `Sec-WebSocket-Version` header missing
    #[error("WebSocket handshake missing Sec-WebSocket-Version header")]
    MissingVersion,

    /// `Sec-WebSocket-Version` names a version other than 13
    #[error("unsupported WebSocket version {0:?} (supported: 13)")]
    UnsupportedVersion(String),

    /// The underlying HTTP connection cannot be taken over
    #[error("connection cannot be upgraded")]
    NotUpgradable,

    /// The 101 response went out but the connection could not be taken over
    #[error("WebSocket upgrade failed: {0}")]
    UpgradeFailed(String),
}

impl HandshakeError {
    /// Classify an extractor rejection, using the request headers to tell a
    /// missing version from an unsupported one
    pub fn from_rejection(rejection: &WebSocketUpgradeRejection, headers: &HeaderMap) -> Self {
        match rejection {
            WebSocketUpgradeRejection::WebSocketKeyHeaderMissing(_) => HandshakeError::MissingKey,
            WebSocketUpgradeRejection::InvalidWebSocketVersionHeader(_) => {
                match headers.get(SEC_WEBSOCKET_VERSION) {
                    None => HandshakeError::MissingVersion,
                    Some(value) => HandshakeError::UnsupportedVersion(
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    ),
                }
            }
            WebSocketUpgradeRejection::ConnectionNotUpgradable(_) => HandshakeError::NotUpgradable,
            other => HandshakeError::NotWebSocket(other.body_text()),
        }
    }
}

impl IntoResponse for HandshakeError {
    fn into_response(self) -> Response {
        let mut response = StatusCode::BAD_REQUEST.into_response();
        if let HandshakeError::UnsupportedVersion(_) = self {
            response.headers_mut().insert(
                SEC_WEBSOCKET_VERSION,
                HeaderValue::from_static(WEBSOCKET_VERSION),
            );
        }
        response
    }
}

/// HTTP handler for every request the server receives
pub(crate) async fn upgrade(State(shared): State<Arc<Shared>>, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &shared).await {
        Ok(ws) => ws,
        Err(rejection) => {
            let err = HandshakeError::from_rejection(&rejection, &parts.headers);
            tracing::warn!(peer = ?peer, uri = %parts.uri, error = %err, "WebSocket handshake rejected");
            shared.events.error(&err.to_string());
            return err.into_response();
        }
    };

    tracing::debug!(peer = ?peer, "WebSocket handshake accepted");

    let config = shared.config();
    let failed = shared.clone();
    let session_shared = shared.clone();
    ws.max_message_size(config.max_message_size_bytes)
        .max_frame_size(config.max_frame_size_bytes)
        .on_failed_upgrade(move |error: axum::Error| {
            let err = HandshakeError::UpgradeFailed(error.to_string());
            tracing::warn!(peer = ?peer, error = %err, "WebSocket upgrade failed");
            failed.events.error(&err.to_string());
        })
        .on_upgrade(move |socket| session::run(session_shared, socket, peer))
}
