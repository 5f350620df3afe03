//! Filter chain subsystem.
//!
//! # Data Flow
//! ```text
//! Exchange (request + response sink)
//!     → response_log.rs   (order -1: install body interceptor)
//!     → load_balance.rs   (order i32::MAX: pick upstream, rewrite, bind route)
//!     → forward.rs        (terminal: call upstream, stream response into sink)
//! ```
//!
//! # Design Decisions
//! - Filters run in ascending `order()`; equal orders keep insertion order
//! - `Next` is consumed by `run`, so a filter can continue the chain at most once
//! - The exchange is threaded explicitly through every stage (no task-locals)

pub mod exchange;
pub mod forward;
pub mod load_balance;
pub mod response_log;
pub mod rewrite;
pub mod route;

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::GatewayError;

pub use exchange::Exchange;
pub use forward::{Forwarder, HttpForwarder};
pub use load_balance::LoadBalanceFilter;
pub use response_log::ResponseLogFilter;
pub use rewrite::{Rewrite, Rewriter};
pub use route::RouteDecision;

pub type FilterFuture<'a> = BoxFuture<'a, Result<(), GatewayError>>;

/// One stage wrapped around the rest of the chain.
pub trait GatewayFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower runs first.
    fn order(&self) -> i32;

    fn filter<'a>(&'a self, exchange: &'a mut Exchange, next: Next<'a>) -> FilterFuture<'a>;
}

/// The remainder of the chain after the current filter.
pub struct Next<'a> {
    filters: &'a [Arc<dyn GatewayFilter>],
    forwarder: &'a dyn Forwarder,
}

impl<'a> Next<'a> {
    /// Continue with the next filter, or forward once all filters have run.
    pub fn run<'b>(self, exchange: &'b mut Exchange) -> FilterFuture<'b>
    where
        'a: 'b,
    {
        match self.filters.split_first() {
            Some((filter, rest)) => {
                tracing::trace!(filter = filter.name(), exchange_id = %exchange.id(), "Running filter");
                filter.filter(
                    exchange,
                    Next {
                        filters: rest,
                        forwarder: self.forwarder,
                    },
                )
            }
            None => {
                let forwarder: &'b dyn Forwarder = self.forwarder;
                Box::pin(forward::forward_exchange(forwarder, exchange))
            }
        }
    }
}

/// Ordered filters plus the forwarding stage they wrap.
pub struct FilterChain {
    filters: Vec<Arc<dyn GatewayFilter>>,
    forwarder: Arc<dyn Forwarder>,
}

impl FilterChain {
    pub fn new(mut filters: Vec<Arc<dyn GatewayFilter>>, forwarder: Arc<dyn Forwarder>) -> Self {
        filters.sort_by_key(|f| f.order());
        tracing::debug!(
            filters = ?filters.iter().map(|f| (f.name(), f.order())).collect::<Vec<_>>(),
            "Filter chain built"
        );
        Self { filters, forwarder }
    }

    /// Filter names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run the whole chain for one exchange.
    pub async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
        Next {
            filters: &self.filters,
            forwarder: self.forwarder.as_ref(),
        }
        .run(exchange)
        .await
    }
}
