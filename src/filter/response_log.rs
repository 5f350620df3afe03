//! Response logging filter.
//!
//! Runs first so that its body interceptor wraps every later stage's output.

use std::sync::Arc;

use crate::config::InterceptConfig;
use crate::filter::exchange::Exchange;
use crate::filter::{FilterFuture, GatewayFilter, Next};
use crate::http::intercept::InterceptingSink;
use crate::http::sink::ResponseSink;
use crate::observability::access_log::ResponseLogger;

pub struct ResponseLogFilter {
    config: InterceptConfig,
    logger: Arc<dyn ResponseLogger>,
}

impl ResponseLogFilter {
    pub const ORDER: i32 = -1;

    pub fn new(config: InterceptConfig, logger: Arc<dyn ResponseLogger>) -> Self {
        Self { config, logger }
    }
}

impl GatewayFilter for ResponseLogFilter {
    fn name(&self) -> &'static str {
        "response_log"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn filter<'a>(&'a self, exchange: &'a mut Exchange, next: Next<'a>) -> FilterFuture<'a> {
        Box::pin(async move {
            let path = exchange.original_path().to_string();
            let started_at = exchange.started_at();
            let logger = self.logger.clone();

            exchange.decorate_response(|inner| -> Box<dyn ResponseSink> {
                Box::new(InterceptingSink::new(inner, &self.config, path, started_at, logger))
            });

            next.run(exchange).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterceptMode;
    use crate::filter::load_balance::LoadBalanceFilter;
    use crate::filter::rewrite::Rewriter;
    use crate::filter::testing::StaticForwarder;
    use crate::filter::FilterChain;
    use crate::http::testing::{CollectingLogger, RecordingSink};
    use crate::http::ServerResponse;
    use crate::load_balancer::{UpstreamPool, UpstreamSelector};
    use axum::body::Body;
    use axum::http::{header, HeaderValue, Request, StatusCode, Uri};

    fn chain(
        forwarder: Arc<StaticForwarder>,
        intercept: InterceptConfig,
        logger: Arc<CollectingLogger>,
    ) -> FilterChain {
        let pool = UpstreamPool::from_addresses(&["http://a:1", "http://b:2"]).unwrap();
        let filters: Vec<Arc<dyn GatewayFilter>> = vec![
            Arc::new(LoadBalanceFilter::new(
                Arc::new(UpstreamSelector::new(pool)),
                Rewriter::new("/loadbalance/"),
            )),
            Arc::new(ResponseLogFilter::new(intercept, logger)),
        ];
        FilterChain::new(filters, forwarder)
    }

    fn per_chunk_suffix() -> InterceptConfig {
        InterceptConfig {
            mode: InterceptMode::PerChunk,
            suffix: Some("  hahahahahah".to_string()),
        }
    }

    #[test]
    fn log_filter_runs_before_load_balancing() {
        let chain = chain(
            Arc::new(StaticForwarder::new(200, "ok")),
            InterceptConfig::default(),
            Arc::new(CollectingLogger::default()),
        );
        assert_eq!(chain.names(), vec!["response_log", "load_balance"]);
    }

    #[tokio::test]
    async fn round_robin_with_suffix_end_to_end() {
        let forwarder = Arc::new(StaticForwarder::new(200, "ok"));
        let logger = Arc::new(CollectingLogger::default());
        let chain = chain(forwarder.clone(), per_chunk_suffix(), logger.clone());

        for _ in 0..3 {
            let request = Request::builder()
                .uri("/loadbalance/ping")
                .body(Body::empty())
                .unwrap();
            let (sink, pending) = ServerResponse::channel(4);
            let mut exchange = Exchange::new(request, Box::new(sink));
            let task = tokio::spawn(async move { Ok(()) });

            chain.handle(&mut exchange).await.unwrap();
            drop(exchange);

            let response = pending.into_response(task).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers().get(header::CONTENT_LENGTH),
                Some(&HeaderValue::from(15usize))
            );
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], b"ok  hahahahahah");
        }

        let targets: Vec<Uri> = forwarder.targets().into_iter().map(|(_, t)| t).collect();
        assert_eq!(
            targets,
            vec![
                Uri::from_static("http://a:1/ping"),
                Uri::from_static("http://b:2/ping"),
                Uri::from_static("http://a:1/ping"),
            ]
        );

        let records = logger.records();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.path == "/loadbalance/ping"));
        assert!(records.iter().all(|r| r.status == Some(StatusCode::OK)));
        assert!(records.iter().all(|r| r.body == "ok  hahahahahah"));
    }

    #[tokio::test]
    async fn accumulating_mode_captures_full_body() {
        let forwarder = Arc::new(StaticForwarder::new(404, "missing"));
        let logger = Arc::new(CollectingLogger::default());
        let chain = chain(forwarder, InterceptConfig::default(), logger.clone());

        let request = Request::builder()
            .uri("/loadbalance/api/x?a=1")
            .body(Body::empty())
            .unwrap();
        let mut exchange = Exchange::new(request, Box::new(RecordingSink::default()));
        chain.handle(&mut exchange).await.unwrap();

        assert_eq!(exchange.response().status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(exchange.response().captured_body(), Some("missing"));

        let records = logger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "/loadbalance/api/x");
        assert_eq!(records[0].status, Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn undecodable_body_reaches_client_unmodified() {
        let forwarder = Arc::new(StaticForwarder::chunked(200, vec![&b"\xff\xfe"[..]]));
        let logger = Arc::new(CollectingLogger::default());
        let chain = chain(
            forwarder.clone(),
            InterceptConfig {
                mode: InterceptMode::PerChunk,
                suffix: Some("!".to_string()),
            },
            logger.clone(),
        );

        let request = Request::builder()
            .uri("/loadbalance/bin")
            .body(Body::empty())
            .unwrap();
        let (sink, pending) = ServerResponse::channel(4);
        let mut exchange = Exchange::new(request, Box::new(sink));
        let task = tokio::spawn(async move { Ok(()) });

        chain.handle(&mut exchange).await.unwrap();
        drop(exchange);
        assert_eq!(forwarder.calls(), 1);

        let response = pending.into_response(task).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH),
            Some(&HeaderValue::from(2usize))
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"\xff\xfe");
        assert!(logger.records().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_logs_nothing() {
        let logger = Arc::new(CollectingLogger::default());
        let chain = chain(
            Arc::new(StaticForwarder::failing()),
            per_chunk_suffix(),
            logger.clone(),
        );

        let request = Request::builder()
            .uri("/loadbalance/ping")
            .body(Body::empty())
            .unwrap();
        let mut exchange = Exchange::new(request, Box::new(RecordingSink::default()));
        assert!(chain.handle(&mut exchange).await.is_err());
        assert!(logger.records().is_empty());
    }
}
