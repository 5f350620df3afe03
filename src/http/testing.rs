//! Test doubles for the response path.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use axum::http::{header, HeaderMap, StatusCode};
use bytes::Bytes;
use futures_util::Sink;

use crate::error::GatewayError;
use crate::http::sink::ResponseSink;
use crate::observability::access_log::{LogRecord, LogResult, ResponseLogger};

/// In-memory sink remembering every chunk and the content-length header
/// that was in place when it was sent.
#[derive(Debug, Default)]
pub struct RecordingSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    committed: bool,
    closed: bool,
    disconnected: bool,
    sent: Vec<(Bytes, Option<usize>)>,
}

impl RecordingSink {
    /// A sink whose client is already gone.
    pub fn disconnected() -> Self {
        Self {
            disconnected: true,
            ..Default::default()
        }
    }

    pub fn chunks(&self) -> Vec<Bytes> {
        self.sent.iter().map(|(chunk, _)| chunk.clone()).collect()
    }

    pub fn lengths_at_send(&self) -> Vec<Option<usize>> {
        self.sent.iter().map(|(_, len)| *len).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check(&self) -> Result<(), GatewayError> {
        if self.disconnected {
            Err(GatewayError::ClientDisconnect)
        } else {
            Ok(())
        }
    }
}

impl Sink<Bytes> for RecordingSink {
    type Error = GatewayError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(self.check())
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> Result<(), Self::Error> {
        let this = self.get_mut();
        this.check()?;
        let len = this
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        this.committed = true;
        this.sent.push((item, len));
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(self.check())
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        this.check()?;
        this.committed = true;
        this.closed = true;
        Poll::Ready(Ok(()))
    }
}

impl ResponseSink for RecordingSink {
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
        self.committed
    }
}

/// Logger that keeps every record.
#[derive(Debug, Default)]
pub struct CollectingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl CollectingLogger {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl ResponseLogger for CollectingLogger {
    fn record(&self, record: &LogRecord) -> LogResult {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

struct Tracked {
    data: Vec<u8>,
    releases: Arc<AtomicUsize>,
}

impl AsRef<[u8]> for Tracked {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// A chunk whose backing buffer bumps `releases` when it is freed.
pub fn tracked_chunk(data: &[u8], releases: &Arc<AtomicUsize>) -> Bytes {
    Bytes::from_owner(Tracked {
        data: data.to_vec(),
        releases: releases.clone(),
    })
}
