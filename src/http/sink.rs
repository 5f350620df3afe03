//! Outbound response sink.
//!
//! # Responsibilities
//! - Define the "set status / set headers / accept chunk / close" capability
//!   every response stage implements ([`ResponseSink`])
//! - Bridge that capability to the HTTP host ([`ServerResponse`])
//!
//! # Design Decisions
//! - Status and headers stay mutable until the first chunk (or close)
//!   commits them to the client
//! - A bounded channel between the sink and the client body is the
//!   backpressure point: `poll_ready` stays pending while it is full
//! - A dropped client body turns every later write into `ClientDisconnect`
//! - The body only ends cleanly after `close`; a sink dropped mid-stream
//!   ends the client body with an error so the connection is aborted
//! - Dropping the pending response before the head arrives aborts the
//!   exchange task

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_channel::{mpsc, oneshot};
use futures_util::{stream, Sink, StreamExt};
use http_body::Frame;
use http_body_util::StreamBody;
use tokio::task::{AbortHandle, JoinHandle};

use crate::error::GatewayError;

/// A writable response: head plus a stream of body chunks.
///
/// Decorators wrap another `ResponseSink` and delegate to it.
pub trait ResponseSink: Sink<Bytes, Error = GatewayError> + Send + Unpin {
    /// Status code set so far, if any.
    fn status(&self) -> Option<StatusCode>;

    fn set_status(&mut self, status: StatusCode);

    fn headers(&self) -> &HeaderMap;

    /// Header changes only reach the client before the head is committed.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// True once status and headers have been handed to the client.
    fn is_committed(&self) -> bool;

    /// Full body text captured by an accumulating stage, once available.
    fn captured_body(&self) -> Option<&str> {
        None
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for Box<S> {
    fn status(&self) -> Option<StatusCode> {
        (**self).status()
    }

    fn set_status(&mut self, status: StatusCode) {
        (**self).set_status(status)
    }

    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn is_committed(&self) -> bool {
        (**self).is_committed()
    }

    fn captured_body(&self) -> Option<&str> {
        (**self).captured_body()
    }
}

/// Committed response head handed to the HTTP host.
#[derive(Debug)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Sink side of a client response.
#[derive(Debug)]
pub struct ServerResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: mpsc::Sender<Bytes>,
    done_tx: Option<oneshot::Sender<()>>,
}

/// Host side of a client response: waits for the head, then streams the body.
#[derive(Debug)]
pub struct PendingResponse {
    head_rx: oneshot::Receiver<ResponseHead>,
    body_rx: mpsc::Receiver<Bytes>,
    done_rx: oneshot::Receiver<()>,
}

impl ServerResponse {
    /// Create a connected sink / pending response pair.
    ///
    /// `buffer` is the number of chunks that may be queued for the client.
    pub fn channel(buffer: usize) -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(buffer);
        let (done_tx, done_rx) = oneshot::channel();
        (
            Self {
                status: None,
                headers: HeaderMap::new(),
                head_tx: Some(head_tx),
                body_tx,
                done_tx: Some(done_tx),
            },
            PendingResponse {
                head_rx,
                body_rx,
                done_rx,
            },
        )
    }

    fn commit(&mut self) -> Result<(), GatewayError> {
        if let Some(head_tx) = self.head_tx.take() {
            let head = ResponseHead {
                status: self.status.unwrap_or(StatusCode::OK),
                headers: self.headers.clone(),
            };
            head_tx.send(head).map_err(|_| GatewayError::ClientDisconnect)?;
        }
        Ok(())
    }
}

impl Sink<Bytes> for ServerResponse {
    type Error = GatewayError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.get_mut()
            .body_tx
            .poll_ready(cx)
            .map_err(|_| GatewayError::ClientDisconnect)
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> Result<(), Self::Error> {
        let this = self.get_mut();
        this.commit()?;
        this.body_tx
            .start_send(item)
            .map_err(|_| GatewayError::ClientDisconnect)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.get_mut().body_tx)
            .poll_flush(cx)
            .map_err(|_| GatewayError::ClientDisconnect)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        // An empty body still has to release the head.
        this.commit()?;
        ready!(Pin::new(&mut this.body_tx).poll_close(cx))
            .map_err(|_| GatewayError::ClientDisconnect)?;
        if let Some(done_tx) = this.done_tx.take() {
            let _ = done_tx.send(());
        }
        Poll::Ready(Ok(()))
    }
}

impl ResponseSink for ServerResponse {
    fn status(&self) -> Option<StatusCode> {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn is_committed(&self) -> bool {
        self.head_tx.is_none()
    }
}

impl PendingResponse {
    /// Resolve into the client response.
    ///
    /// If the exchange task finishes without committing a head, its error is
    /// rendered instead.
    pub async fn into_response(self, task: JoinHandle<Result<(), GatewayError>>) -> Response {
        let mut guard = AbortOnDrop(Some(task.abort_handle()));

        match self.head_rx.await {
            Ok(head) => {
                // From here on the task streams the body on its own.
                guard.0 = None;

                let frames = self
                    .body_rx
                    .map(|chunk| Ok::<_, GatewayError>(Frame::data(chunk)));
                let end = stream::once(self.done_rx).filter_map(|done| async move {
                    match done {
                        Ok(()) => None,
                        Err(_) => Some(Err::<Frame<Bytes>, _>(GatewayError::ResponseAborted)),
                    }
                });
                let mut response = Response::new(Body::new(StreamBody::new(frames.chain(end))));
                *response.status_mut() = head.status;
                *response.headers_mut() = head.headers;
                response
            }
            Err(_) => match task.await {
                Ok(Err(e)) => e.into_response(),
                Ok(Ok(())) => {
                    GatewayError::UpstreamForwarding("no response produced".into()).into_response()
                }
                Err(e) => {
                    tracing::error!(error = %e, "Exchange task failed");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            },
        }
    }
}

/// Aborts the exchange task if the client stops waiting for the head.
struct AbortOnDrop(Option<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}
