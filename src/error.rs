//! Per-request error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised while processing a single exchange.
///
/// None of these affect other in-flight requests or the shared
/// round-robin counter.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The forwarding collaborator failed (connect, timeout, bad response).
    #[error("upstream forwarding failed: {0}")]
    UpstreamForwarding(String),

    /// The rewritten target could not be turned into a URI.
    #[error("invalid target uri '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Forwarding was reached without a route bound to the exchange.
    #[error("no route bound to exchange")]
    NoRoute,

    /// The client went away; the outbound sink rejected a write.
    #[error("client disconnected")]
    ClientDisconnect,

    /// The exchange ended after the head was sent but before the body was
    /// complete. Surfaced to the client as a broken body stream.
    #[error("response aborted before the body was complete")]
    ResponseAborted,

    /// A write was attempted after the response stream was closed.
    #[error("response stream already closed")]
    StreamClosed,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::UpstreamForwarding(_) | GatewayError::ResponseAborted => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::ClientDisconnect => StatusCode::BAD_REQUEST,
            GatewayError::InvalidTarget { .. }
            | GatewayError::NoRoute
            | GatewayError::StreamClosed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = match &self {
            GatewayError::UpstreamForwarding(_) => "Upstream request failed",
            _ => "Gateway error",
        };
        (self.status_code(), body).into_response()
    }
}
