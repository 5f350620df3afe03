//! Routing decisions attached to an exchange.

use axum::http::Uri;

use crate::filter::exchange::Exchange;

/// When a route applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePredicate {
    /// Matches every exchange.
    Any,
}

impl RoutePredicate {
    pub fn matches(&self, _exchange: &Exchange) -> bool {
        match self {
            RoutePredicate::Any => true,
        }
    }
}

/// Immutable routing decision created per request by the load-balance filter
/// and read only by the forwarding stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    id: String,
    uri: Uri,
    order: i32,
    predicate: RoutePredicate,
}

impl RouteDecision {
    /// Id given to routes produced by rewriting.
    pub const REWRITTEN_ID: &'static str = "modified-route";

    /// A match-everything route to `uri`.
    pub fn to(uri: Uri) -> Self {
        Self {
            id: Self::REWRITTEN_ID.to_string(),
            uri,
            order: 0,
            predicate: RoutePredicate::Any,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fully-qualified target of the forwarded request.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn predicate(&self) -> RoutePredicate {
        self.predicate
    }
}
