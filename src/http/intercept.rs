//! Response body interception.
//!
//! [`InterceptingSink`] wraps the exchange's response sink and sees every
//! chunk on its way to the client.
//!
//! # States
//! ```text
//! Idle ──first chunk──▶ Receiving ──close──▶ Finalizing ──inner closed──▶ Closed
//!   └───────────────────close (empty body)──────▶┘
//! ```
//!
//! # Modes
//! - Per-chunk: each chunk is decoded, optionally suffixed, logged and
//!   forwarded, and `content-length` is rewritten to that chunk's size. Only
//!   the first chunk's header reaches the client, so this mode is exact for
//!   single-chunk bodies only.
//! - Accumulating: chunks are forwarded untouched and their bytes appended
//!   to a buffer; the merged text is decoded, logged once on close and exposed
//!   through [`ResponseSink::captured_body`].

use std::pin::Pin;
use std::str::Utf8Error;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Instant;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use bytes::{Bytes, BytesMut};
use futures_util::Sink;
use thiserror::Error;

use crate::config::{InterceptConfig, InterceptMode};
use crate::error::GatewayError;
use crate::http::sink::ResponseSink;
use crate::observability::access_log::{emit, LogRecord, ResponseLogger};

/// A response body could not be decoded as UTF-8 for logging.
///
/// Never fatal: the bytes are still forwarded.
#[derive(Debug, Error)]
#[error("response body of {path} is not valid UTF-8 (chunk {chunk}): {source}")]
pub struct StreamDecodeWarning {
    pub path: String,
    pub chunk: usize,
    #[source]
    pub source: Utf8Error,
}

/// Interceptor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptState {
    Idle,
    Receiving,
    Finalizing,
    Closed,
}

/// Decorator over a [`ResponseSink`] that logs (and optionally transforms)
/// the body as it streams through.
pub struct InterceptingSink<S> {
    inner: S,
    mode: InterceptMode,
    suffix: Option<String>,
    path: String,
    started_at: Instant,
    logger: Arc<dyn ResponseLogger>,
    state: InterceptState,
    chunks: usize,
    buffer: BytesMut,
    captured: Option<String>,
}

impl<S: ResponseSink> InterceptingSink<S> {
    pub fn new(
        inner: S,
        config: &InterceptConfig,
        path: impl Into<String>,
        started_at: Instant,
        logger: Arc<dyn ResponseLogger>,
    ) -> Self {
        Self {
            inner,
            mode: config.mode,
            suffix: config.suffix.clone(),
            path: path.into(),
            started_at,
            logger,
            state: InterceptState::Idle,
            chunks: 0,
            buffer: BytesMut::new(),
            captured: None,
        }
    }

    pub fn state(&self) -> InterceptState {
        self.state
    }

    fn record(&self, body: String) {
        let record = LogRecord::new(
            self.path.clone(),
            self.inner.status(),
            self.started_at.elapsed(),
            body,
        );
        emit(self.logger.as_ref(), &record);
    }

    fn set_content_length(&mut self, len: usize) {
        if self.inner.is_committed() {
            tracing::debug!(
                path = %self.path,
                content_length = len,
                "Response already committed, content-length not updated for client"
            );
        }
        self.inner
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    /// Copy the chunk out, release it, and produce the bytes to forward.
    fn transform(&mut self, chunk: Bytes) -> Bytes {
        let mut content = BytesMut::from(&chunk[..]);
        drop(chunk);
        self.chunks += 1;

        match self.mode {
            InterceptMode::PerChunk => {
                let text = match std::str::from_utf8(&content) {
                    Ok(text) => Some(text.to_owned()),
                    Err(source) => {
                        let warning = StreamDecodeWarning {
                            path: self.path.clone(),
                            chunk: self.chunks,
                            source,
                        };
                        tracing::warn!(error = %warning, "Forwarding undecodable chunk unmodified");
                        None
                    }
                };

                if let Some(mut text) = text {
                    if let Some(suffix) = &self.suffix {
                        content.extend_from_slice(suffix.as_bytes());
                        text.push_str(suffix);
                    }
                    self.record(text);
                }

                self.set_content_length(content.len());
                content.freeze()
            }
            InterceptMode::Accumulating => {
                self.buffer.extend_from_slice(&content);
                content.freeze()
            }
        }
    }

    /// Runs once, when the upstream signals end of stream.
    fn finalize(&mut self) {
        if self.mode != InterceptMode::Accumulating {
            return;
        }

        let body = std::mem::take(&mut self.buffer);
        let text = match std::str::from_utf8(&body) {
            Ok(text) => text.to_owned(),
            Err(source) => {
                let warning = StreamDecodeWarning {
                    path: self.path.clone(),
                    chunk: self.chunks,
                    source,
                };
                tracing::warn!(error = %warning, "Logging lossy response body");
                String::from_utf8_lossy(&body).into_owned()
            }
        };

        if !self.inner.is_committed() {
            self.set_content_length(body.len());
        }
        self.record(text.clone());
        self.captured = Some(text);
    }

    /// Drop everything held for this response and refuse further writes.
    fn abandon(&mut self, err: GatewayError) -> GatewayError {
        if self.state != InterceptState::Closed {
            tracing::debug!(path = %self.path, error = %err, "Abandoning intercepted response");
        }
        self.buffer = BytesMut::new();
        self.state = InterceptState::Closed;
        err
    }
}

impl<S: ResponseSink> Sink<Bytes> for InterceptingSink<S> {
    type Error = GatewayError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        if matches!(this.state, InterceptState::Finalizing | InterceptState::Closed) {
            return Poll::Ready(Err(GatewayError::StreamClosed));
        }
        Pin::new(&mut this.inner)
            .poll_ready(cx)
            .map_err(|e| this.abandon(e))
    }

    fn start_send(self: Pin<&mut Self>, chunk: Bytes) -> Result<(), Self::Error> {
        let this = self.get_mut();
        if matches!(this.state, InterceptState::Finalizing | InterceptState::Closed) {
            return Err(GatewayError::StreamClosed);
        }
        this.state = InterceptState::Receiving;

        let forwarded = this.transform(chunk);
        Pin::new(&mut this.inner)
            .start_send(forwarded)
            .map_err(|e| this.abandon(e))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        if this.state == InterceptState::Closed {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner)
            .poll_flush(cx)
            .map_err(|e| this.abandon(e))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        match this.state {
            InterceptState::Closed => return Poll::Ready(Ok(())),
            InterceptState::Idle | InterceptState::Receiving => {
                this.state = InterceptState::Finalizing;
                this.finalize();
            }
            InterceptState::Finalizing => {}
        }

        match ready!(Pin::new(&mut this.inner).poll_close(cx)) {
            Ok(()) => {
                this.state = InterceptState::Closed;
                Poll::Ready(Ok(()))
            }
            Err(e) => Poll::Ready(Err(this.abandon(e))),
        }
    }
}

impl<S: ResponseSink> ResponseSink for InterceptingSink<S> {
    fn status(&self) -> Option<StatusCode> {
        self.inner.status()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.inner.set_status(status)
    }

    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn is_committed(&self) -> bool {
        self.inner.is_committed()
    }

    fn captured_body(&self) -> Option<&str> {
        self.captured.as_deref().or_else(|| self.inner.captured_body())
    }
}
