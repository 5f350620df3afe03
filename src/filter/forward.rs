//! Forwarding to the chosen upstream.
//!
//! # Responsibilities
//! - Define the forwarding capability ([`Forwarder`]) and its hyper client
//!   implementation
//! - Terminal chain stage: send the rewritten request to the bound route and
//!   stream the upstream response into the exchange's response sink
//!
//! # Design Decisions
//! - No retries; the first failure is returned to the caller
//! - Hop-by-hop headers are stripped in both directions
//! - Every body chunk waits for sink readiness (backpressure) and is
//!   written in upstream order

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, Response, Uri};
use futures_util::future::BoxFuture;
use futures_util::SinkExt;
use http_body_util::BodyExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::GatewayError;
use crate::filter::exchange::Exchange;
use crate::http::sink::ResponseSink;

pub type ForwardFuture = BoxFuture<'static, Result<Response<Body>, GatewayError>>;

/// Performs the network call for a rewritten request.
pub trait Forwarder: Send + Sync {
    fn forward(&self, request: Request<Body>, target: Uri) -> ForwardFuture;
}

/// Forwarder backed by the hyper-util pooled client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl HttpForwarder {
    /// `timeout` bounds the wait for upstream response headers.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }
}

impl Forwarder for HttpForwarder {
    fn forward(&self, request: Request<Body>, target: Uri) -> ForwardFuture {
        let client = self.client.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            parts.uri = target;
            // The client fills in the upstream's own host.
            parts.headers.remove(header::HOST);
            strip_hop_by_hop(&mut parts.headers);

            match tokio::time::timeout(timeout, client.request(Request::from_parts(parts, body))).await {
                Ok(Ok(response)) => Ok(response.map(Body::new)),
                Ok(Err(e)) => Err(GatewayError::UpstreamForwarding(e.to_string())),
                Err(_) => Err(GatewayError::UpstreamForwarding(format!(
                    "no response within {:?}",
                    timeout
                ))),
            }
        })
    }
}

/// Terminal stage of the filter chain.
pub(crate) async fn forward_exchange(
    forwarder: &dyn Forwarder,
    exchange: &mut Exchange,
) -> Result<(), GatewayError> {
    let target = exchange.route().ok_or(GatewayError::NoRoute)?.uri().clone();
    let request = exchange.take_request();

    let response = forwarder.forward(request, target).await?;
    write_response(exchange.response_mut(), response).await
}

/// Copy status, end-to-end headers and every body chunk into `sink`, then close it.
pub async fn write_response<S: ResponseSink>(
    sink: &mut S,
    response: Response<Body>,
) -> Result<(), GatewayError> {
    let (parts, mut body) = response.into_parts();

    sink.set_status(parts.status);
    let headers = sink.headers_mut();
    for (name, value) in parts.headers.iter() {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| GatewayError::UpstreamForwarding(e.to_string()))?;
        // Trailers are not forwarded.
        if let Ok(chunk) = frame.into_data() {
            if !chunk.is_empty() {
                sink.send(chunk).await?;
            }
        }
    }

    sink.close().await
}

static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}
