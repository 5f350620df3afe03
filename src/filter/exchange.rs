//! Per-request exchange context.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, Uri};
use bytes::Bytes;
use futures_util::Sink;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::filter::route::RouteDecision;
use crate::http::sink::ResponseSink;

/// Everything one request carries through the filter chain.
///
/// Owned by exactly one in-flight request and dropped when it completes,
/// fails or the client goes away.
pub struct Exchange {
    id: Uuid,
    started_at: Instant,
    original_uri: Uri,
    request: Request<Body>,
    route: Option<RouteDecision>,
    response: Box<dyn ResponseSink>,
}

impl Exchange {
    pub fn new(request: Request<Body>, response: Box<dyn ResponseSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
            original_uri: request.uri().clone(),
            request,
            route: None,
            response,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Path as received, before any rewrite.
    pub fn original_path(&self) -> &str {
        self.original_uri.path()
    }

    pub fn original_query(&self) -> Option<&str> {
        self.original_uri.query()
    }

    /// The request that will be forwarded (rewritten once a route is bound).
    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request<Body> {
        &mut self.request
    }

    /// Replace the request path, keeping the original query string.
    pub fn rewrite_request_path(&mut self, path: &str) -> Result<(), GatewayError> {
        let path_and_query = match self.original_query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        };
        let uri = Uri::builder()
            .path_and_query(path_and_query.as_str())
            .build()
            .map_err(|e| GatewayError::InvalidTarget {
                target: path_and_query.clone(),
                reason: e.to_string(),
            })?;
        *self.request.uri_mut() = uri;
        Ok(())
    }

    /// Move the request out for forwarding, leaving an empty one behind.
    pub fn take_request(&mut self) -> Request<Body> {
        std::mem::replace(&mut self.request, Request::new(Body::empty()))
    }

    pub fn route(&self) -> Option<&RouteDecision> {
        self.route.as_ref()
    }

    /// Attach the routing decision used by the forwarding stage.
    pub fn bind_route(&mut self, route: RouteDecision) {
        self.route = Some(route);
    }

    pub fn response(&self) -> &dyn ResponseSink {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> &mut Box<dyn ResponseSink> {
        &mut self.response
    }

    /// Wrap the current response sink with a decorator.
    pub fn decorate_response<F>(&mut self, decorate: F)
    where
        F: FnOnce(Box<dyn ResponseSink>) -> Box<dyn ResponseSink>,
    {
        let inner = std::mem::replace(&mut self.response, Box::new(Detached::default()));
        self.response = decorate(inner);
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.id)
            .field("original_uri", &self.original_uri)
            .field("request_uri", self.request.uri())
            .field("route", &self.route)
            .field("status", &self.response.status())
            .finish()
    }
}

/// Stand-in sink used only while a decorator is being installed.
#[derive(Default)]
struct Detached {
    headers: HeaderMap,
}

impl Sink<Bytes> for Detached {
    type Error = GatewayError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Err(GatewayError::StreamClosed))
    }

    fn start_send(self: Pin<&mut Self>, _item: Bytes) -> Result<(), Self::Error> {
        Err(GatewayError::StreamClosed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Err(GatewayError::StreamClosed))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Err(GatewayError::StreamClosed))
    }
}

impl ResponseSink for Detached {
    fn status(&self) -> Option<StatusCode> {
        None
    }

    fn set_status(&mut self, _status: StatusCode) {}

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn is_committed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::RecordingSink;

    fn exchange(uri: &str) -> Exchange {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        Exchange::new(request, Box::new(RecordingSink::default()))
    }

    #[test]
    fn rewrite_keeps_query_and_original() {
        let mut exchange = exchange("/loadbalance/api/x?a=1");
        exchange.rewrite_request_path("/api/x").unwrap();

        assert_eq!(exchange.request().uri(), "/api/x?a=1");
        assert_eq!(exchange.original_path(), "/loadbalance/api/x");
        assert_eq!(exchange.original_query(), Some("a=1"));
    }

    #[test]
    fn take_request_leaves_empty_request() {
        let mut exchange = exchange("/ping");
        let request = exchange.take_request();
        assert_eq!(request.uri(), "/ping");
        assert_eq!(exchange.request().uri(), "/");
    }

    #[test]
    fn decorate_response_wraps_current_sink() {
        let mut exchange = exchange("/ping");
        exchange.response_mut().set_status(StatusCode::ACCEPTED);

        exchange.decorate_response(|inner| {
            assert_eq!(inner.status(), Some(StatusCode::ACCEPTED));
            inner
        });
        assert_eq!(exchange.response().status(), Some(StatusCode::ACCEPTED));
    }
}
