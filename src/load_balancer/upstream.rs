//! Upstream addresses and the static pool they live in.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::config::ConfigError;

/// A single upstream base address, e.g. `http://localhost:8081`.
///
/// Stored without a trailing slash so a rewritten path can be appended as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Upstream {
    base: String,
}

impl Upstream {
    /// Parse and validate an upstream base address.
    ///
    /// Only plain `http` is accepted (TLS to upstreams is not supported), a
    /// host is required and the address must not carry a path, query or
    /// fragment.
    pub fn parse(address: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidUpstream {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(address).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid("scheme must be http"));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("must not contain a path, query or fragment"));
        }

        Ok(Self {
            base: address.trim_end_matches('/').to_string(),
        })
    }

    /// The base address (scheme + host + port).
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

/// Ordered, immutable, non-empty list of upstreams.
#[derive(Debug, Clone)]
pub struct UpstreamPool {
    upstreams: Arc<[Upstream]>,
}

impl UpstreamPool {
    /// Build a pool. Fails if `upstreams` is empty.
    pub fn new(upstreams: Vec<Upstream>) -> Result<Self, ConfigError> {
        if upstreams.is_empty() {
            return Err(ConfigError::EmptyUpstreamPool);
        }
        Ok(Self {
            upstreams: upstreams.into(),
        })
    }

    /// Parse every address in order and build a pool from them.
    pub fn from_addresses<S: AsRef<str>>(addresses: &[S]) -> Result<Self, ConfigError> {
        let upstreams = addresses
            .iter()
            .map(|a| Upstream::parse(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(upstreams)
    }

    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }

    /// Upstream at `index` modulo the pool size.
    pub fn get(&self, index: usize) -> &Upstream {
        &self.upstreams[index % self.upstreams.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Upstream> {
        self.upstreams.iter()
    }
}
