//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all gateway handler
//! - Wire up middleware (tracing, request timeout)
//! - Build the filter chain from configuration
//! - Run one exchange task per request and stream its response back
//! - Stop accepting on shutdown and drain in-flight requests

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayError;
use crate::filter::{
    Exchange, FilterChain, GatewayFilter, HttpForwarder, LoadBalanceFilter, ResponseLogFilter,
    Rewriter,
};
use crate::http::sink::ServerResponse;
use crate::load_balancer::{UpstreamPool, UpstreamSelector};
use crate::observability::TracingLogger;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<FilterChain>,
    pub response_buffer: usize,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a server around an already built filter chain.
    pub fn new(config: GatewayConfig, chain: Arc<FilterChain>) -> Self {
        let state = AppState {
            chain,
            response_buffer: config.listener.response_buffer_chunks.max(1),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the selector, filters and forwarder described by `config`.
    pub fn from_config(config: GatewayConfig) -> Result<Self, ConfigError> {
        let pool = UpstreamPool::from_addresses(&config.upstreams.addresses[..])?;
        tracing::info!(
            upstreams = ?pool.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Upstream pool ready"
        );
        let selector = Arc::new(UpstreamSelector::new(pool));

        let filters: Vec<Arc<dyn GatewayFilter>> = vec![
            Arc::new(ResponseLogFilter::new(
                config.intercept.clone(),
                Arc::new(TracingLogger),
            )),
            Arc::new(LoadBalanceFilter::new(
                selector,
                Rewriter::new(config.load_balance.strip_prefix.clone()),
            )),
        ];
        let forwarder = Arc::new(HttpForwarder::new(Duration::from_secs(
            config.timeouts.upstream_secs,
        )));

        let chain = Arc::new(FilterChain::new(filters, forwarder));
        Ok(Self::new(config, chain))
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Catch-all handler: every request becomes one exchange through the chain.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (sink, pending) = ServerResponse::channel(state.response_buffer);
    let mut exchange = Exchange::new(request, Box::new(sink));

    tracing::debug!(
        exchange_id = %exchange.id(),
        method = %exchange.request().method(),
        path = %exchange.original_path(),
        "Exchange started"
    );

    let chain = state.chain.clone();
    let task = tokio::spawn(async move {
        let result = chain.handle(&mut exchange).await;
        match &result {
            Ok(()) => {}
            Err(GatewayError::ClientDisconnect) => {
                tracing::debug!(exchange_id = %exchange.id(), "Client went away")
            }
            Err(e) => tracing::warn!(exchange_id = %exchange.id(), error = %e, "Exchange failed"),
        }
        result
    });

    pending.into_response(task).await
}
