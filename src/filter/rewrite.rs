//! Request path rewriting.
//!
//! Pure mapping from (path, query, upstream) to the new request path and the
//! fully-qualified forwarding target. No state, no side effects.

use axum::http::Uri;

use crate::error::GatewayError;
use crate::load_balancer::Upstream;

/// Result of rewriting one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Path sent to the upstream.
    pub path: String,
    /// Upstream base + path (+ `?query`).
    pub target: Uri,
}

/// Strips a fixed prefix and points the request at an upstream.
#[derive(Debug, Clone)]
pub struct Rewriter {
    strip_prefix: String,
}

impl Rewriter {
    /// `strip_prefix` must start and end with `/` (checked by config validation).
    pub fn new(strip_prefix: impl Into<String>) -> Self {
        Self {
            strip_prefix: strip_prefix.into(),
        }
    }

    /// New path for `original_path`.
    ///
    /// A matching prefix is replaced by a single `/`, so stripping a prefix
    /// equal to the whole path yields `/`. Other paths pass through unchanged.
    pub fn rewrite_path(&self, original_path: &str) -> String {
        match original_path.strip_prefix(&self.strip_prefix) {
            Some(rest) => format!("/{}", rest),
            None => original_path.to_string(),
        }
    }

    pub fn rewrite(
        &self,
        original_path: &str,
        original_query: Option<&str>,
        upstream: &Upstream,
    ) -> Result<Rewrite, GatewayError> {
        let path = self.rewrite_path(original_path);

        let mut target = String::with_capacity(upstream.base().len() + path.len() + 16);
        target.push_str(upstream.base());
        target.push_str(&path);
        if let Some(query) = original_query.filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(query);
        }

        let uri = target.parse::<Uri>().map_err(|e| GatewayError::InvalidTarget {
            target: target.clone(),
            reason: e.to_string(),
        })?;

        Ok(Rewrite { path, target: uri })
    }
}
