//! Round-robin upstream selection.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::upstream::{Upstream, UpstreamPool};

/// Round-robin selector.
/// Stores an internal counter to rotate through the pool.
///
/// The counter is the only state shared between in-flight requests. Each
/// call to [`next`](Self::next) takes a distinct tick with a single
/// `fetch_add`, so concurrent callers never observe the same value.
#[derive(Debug)]
pub struct UpstreamSelector {
    pool: UpstreamPool,
    counter: AtomicUsize,
}

impl UpstreamSelector {
    pub fn new(pool: UpstreamPool) -> Self {
        Self {
            pool,
            counter: AtomicUsize::new(0),
        }
    }

    /// Pick the next upstream in pool order.
    pub fn next(&self) -> &Upstream {
        let tick = self.counter.fetch_add(1, Ordering::Relaxed);
        let upstream = self.pool.get(tick);
        metrics::counter!("gateway_upstream_selected_total", "upstream" => upstream.base().to_string())
            .increment(1);
        upstream
    }

    pub fn pool(&self) -> &UpstreamPool {
        &self.pool
    }
}
