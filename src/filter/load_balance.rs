//! Load-balancing filter.
//!
//! Runs last: picks the next upstream, rewrites the request path and binds
//! the resulting route, then continues to the forwarding stage and reports
//! the final status once it completes. Response metrics are recorded here,
//! once per exchange, whatever the interception mode.

use std::sync::Arc;

use crate::filter::exchange::Exchange;
use crate::filter::rewrite::Rewriter;
use crate::filter::route::RouteDecision;
use crate::filter::{FilterFuture, GatewayFilter, Next};
use crate::load_balancer::UpstreamSelector;
use crate::observability::metrics;

pub struct LoadBalanceFilter {
    selector: Arc<UpstreamSelector>,
    rewriter: Rewriter,
}

impl LoadBalanceFilter {
    pub const ORDER: i32 = i32::MAX;

    pub fn new(selector: Arc<UpstreamSelector>, rewriter: Rewriter) -> Self {
        Self { selector, rewriter }
    }
}

impl GatewayFilter for LoadBalanceFilter {
    fn name(&self) -> &'static str {
        "load_balance"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn filter<'a>(&'a self, exchange: &'a mut Exchange, next: Next<'a>) -> FilterFuture<'a> {
        Box::pin(async move {
            let upstream = self.selector.next();
            let rewrite =
                self.rewriter
                    .rewrite(exchange.original_path(), exchange.original_query(), upstream)?;

            exchange.rewrite_request_path(&rewrite.path)?;
            tracing::info!(
                exchange_id = %exchange.id(),
                path = %exchange.original_path(),
                upstream = %upstream,
                target = %rewrite.target,
                "Forwarding request"
            );
            exchange.bind_route(RouteDecision::to(rewrite.target));

            let result = next.run(&mut *exchange).await;

            match &result {
                Ok(()) => match exchange.response().status() {
                    Some(status) => tracing::info!(
                        exchange_id = %exchange.id(),
                        status = status.as_u16(),
                        "Response status"
                    ),
                    None => tracing::info!(exchange_id = %exchange.id(), "Response status: no status set"),
                },
                Err(e) => tracing::warn!(
                    exchange_id = %exchange.id(),
                    error = %e,
                    "Forwarding failed"
                ),
            }

            let status = match &result {
                Err(e) if !exchange.response().is_committed() => e.status_code().as_u16(),
                _ => exchange.response().status().map_or(0, |s| s.as_u16()),
            };
            metrics::record_response(status, exchange.started_at().elapsed());
            result
        })
    }
}
